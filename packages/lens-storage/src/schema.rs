pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_items.sql")),
				"tables/002_sync_state.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_sync_state.sql")),
				"tables/003_ingest_queue.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_ingest_queue.sql")),
				"tables/004_query_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_query_cache.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_expands_every_include() {
		let rendered = render_schema();

		assert!(!rendered.contains("\\ir "));
		assert!(rendered.contains("CREATE TABLE IF NOT EXISTS items"));
		assert!(rendered.contains("CREATE TABLE IF NOT EXISTS sync_state"));
		assert!(rendered.contains("CREATE TABLE IF NOT EXISTS ingest_queue"));
		assert!(rendered.contains("CREATE TABLE IF NOT EXISTS query_cache"));
	}
}
