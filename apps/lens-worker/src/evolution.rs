use time::{OffsetDateTime, Time};

use lens_domain::model_version_tag;
use lens_storage::{models::NewTask, queries, queue, state};

use crate::{Error, Result, worker::WorkerState};

/// Budget-gated daily refresh: picks however many stale-model items today's
/// remaining spend affords and enqueues them as refresh tasks. Runs at most
/// once per UTC day, after the configured trigger time. A failed budget read
/// skips the cycle entirely - overspending silently is worse than missing a
/// day.
pub async fn run_if_due(state: &WorkerState) -> Result<()> {
	let cfg = &state.cfg.evolution;
	let now = OffsetDateTime::now_utc();
	let Some((hour, minute)) = lens_config::parse_trigger_utc(&cfg.trigger_utc) else {
		return Err(Error::Message(format!("Invalid evolution trigger: {}.", cfg.trigger_utc)));
	};
	let trigger = Time::from_hms(hour, minute, 0)
		.map_err(|_| Error::Message(format!("Invalid evolution trigger: {}.", cfg.trigger_utc)))?;

	if now.time() < trigger {
		return Ok(());
	}

	let today = day_string(now);

	if state::get_state(&state.db, state::EVOLUTION_LAST_RUN).await?.as_deref()
		== Some(today.as_str())
	{
		return Ok(());
	}

	let spent = read_spend_today(state, now).await?;
	let budget = cfg.daily_ceiling_units - spent - cfg.reserve_units;
	let batch = affordable_batch(budget, cfg.cost_per_item_units, cfg.batch_cap);

	if batch == 0 {
		tracing::info!(spent, "No enrichment budget left for evolution today.");
		state::set_state(&state.db, state::EVOLUTION_LAST_RUN, &today).await?;

		return Ok(());
	}

	let current = model_version_tag(
		&state.cfg.providers.vision.model,
		&state.cfg.providers.embedding.model,
	);
	let stale = queries::stale_model_items(&state.db, &current, batch as i64).await?;

	if stale.is_empty() {
		tracing::info!("All items carry the current model version.");
		state::set_state(&state.db, state::EVOLUTION_LAST_RUN, &today).await?;

		return Ok(());
	}

	let tasks: Vec<NewTask> = stale
		.iter()
		.map(|item| NewTask {
			kind: queue::TASK_REFRESH_ITEM.to_string(),
			item_id: item.item_id.clone(),
			payload: serde_json::json!({}),
		})
		.collect();
	let count = queue::enqueue_tasks(&state.db, &tasks).await?;

	state::set_state(&state.db, state::EVOLUTION_LAST_RUN, &today).await?;
	tracing::info!(count, "Enqueued evolution refresh tasks.");

	Ok(())
}

/// Today's metered spend. A present-but-unparseable counter is an error,
/// not a zero - guessing here is exactly what the budget gate exists to
/// prevent.
async fn read_spend_today(state: &WorkerState, now: OffsetDateTime) -> Result<i64> {
	let key = state::spend_key(now.date());

	match state::get_state(&state.db, &key).await? {
		Some(raw) => raw
			.trim()
			.parse()
			.map_err(|_| Error::Message(format!("Spend counter {key} holds a non-numeric value."))),
		None => Ok(0),
	}
}

pub fn affordable_batch(budget: i64, cost_per_item: i64, cap: u32) -> u32 {
	if budget <= 0 || cost_per_item <= 0 {
		return 0;
	}

	(budget / cost_per_item).min(cap as i64) as u32
}

fn day_string(now: OffsetDateTime) -> String {
	let date = now.date();

	format!("{:04}-{:02}-{:02}", date.year(), date.month() as u8, date.day())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn batch_is_zero_below_one_item_cost() {
		assert_eq!(affordable_batch(30, 33, 500), 0);
		assert_eq!(affordable_batch(0, 33, 500), 0);
		assert_eq!(affordable_batch(-100, 33, 500), 0);
	}

	#[test]
	fn batch_divides_budget_and_caps() {
		assert_eq!(affordable_batch(100, 33, 500), 3);
		assert_eq!(affordable_batch(1_000_000, 33, 500), 500);
		assert_eq!(affordable_batch(33, 33, 500), 1);
	}

	#[test]
	fn day_string_is_zero_padded() {
		let date = time::Date::from_calendar_date(2026, time::Month::March, 7)
			.expect("invalid test date");
		let now = date.with_hms(23, 5, 0).expect("invalid test time").assume_utc();

		assert_eq!(day_string(now), "2026-03-07");
	}
}
