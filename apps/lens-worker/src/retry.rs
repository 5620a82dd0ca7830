use std::{future::Future, time::Duration};

/// The one retry abstraction every workflow step and scheduler phase goes
/// through: bounded attempts with a fixed or exponential backoff.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff: Backoff,
}

#[derive(Clone, Copy, Debug)]
pub enum Backoff {
	Fixed(Duration),
	Exponential { base: Duration, max: Duration },
}

impl RetryPolicy {
	pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
		Self { max_attempts: max_attempts.max(1), backoff: Backoff::Fixed(delay) }
	}

	pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
		Self { max_attempts: max_attempts.max(1), backoff: Backoff::Exponential { base, max } }
	}

	/// Delay after the `attempt`-th failure (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		match self.backoff {
			Backoff::Fixed(delay) => delay,
			Backoff::Exponential { base, max } => {
				let exp = attempt.saturating_sub(1).min(16);

				base.saturating_mul(1 << exp).min(max)
			},
		}
	}
}

/// Runs `op` until it succeeds or the policy's attempt budget is spent.
/// Every failure is logged with the step label so an exhausted budget is
/// diagnosable from the logs alone.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, step: &str, mut op: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: std::fmt::Display,
{
	let mut attempt = 0;

	loop {
		attempt += 1;

		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if attempt < policy.max_attempts => {
				tracing::warn!(error = %err, step, attempt, "Step failed. Retrying.");

				tokio::time::sleep(policy.delay_for(attempt)).await;
			},
			Err(err) => {
				tracing::error!(error = %err, step, attempt, "Step failed. Retry budget exhausted.");

				return Err(err);
			},
		}
	}
}
