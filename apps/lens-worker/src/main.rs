use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = lens_worker::Args::parse();

	lens_worker::run(args).await
}
