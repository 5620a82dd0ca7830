use lens_providers::rerank::RerankEntry;

/// Builds the merged candidate ordering after a re-rank call.
///
/// `head` is how many leading candidates were submitted to the model;
/// entries index into that head. Returns `None` when fewer than
/// `min_usable` distinct usable rankings came back, in which case the
/// caller keeps the vector-similarity order untouched. Otherwise the ranked
/// head (best score first) comes first and every remaining candidate
/// follows in its original position.
pub fn rerank_order(
	candidate_count: usize,
	head: usize,
	entries: &[RerankEntry],
	min_usable: usize,
) -> Option<Vec<usize>> {
	let head = head.min(candidate_count);
	let mut ranked: Vec<RerankEntry> = Vec::with_capacity(entries.len());

	for entry in entries {
		if entry.index < head && !ranked.iter().any(|seen| seen.index == entry.index) {
			ranked.push(*entry);
		}
	}

	if ranked.len() < min_usable {
		return None;
	}

	ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

	let mut order: Vec<usize> = ranked.iter().map(|entry| entry.index).collect();

	for index in 0..candidate_count {
		if !order.contains(&index) {
			order.push(index);
		}
	}

	Some(order)
}

/// Position-based display score for the re-ranked head, original similarity
/// score for the rest. The synthetic head scores make the re-ordering
/// visible to clients that sort by score.
pub fn display_score(position: usize, reranked_head: usize, vector_score: f32) -> f32 {
	if position < reranked_head { 1.0 - 0.01 * position as f32 } else { vector_score }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(index: usize, score: f32) -> RerankEntry {
		RerankEntry { index, score }
	}

	#[test]
	fn reorders_head_and_appends_remainder() {
		let entries = [entry(2, 0.9), entry(0, 0.5), entry(1, 0.7)];
		let order = rerank_order(5, 3, &entries, 3).expect("expected a merged order");

		assert_eq!(order, vec![2, 1, 0, 3, 4]);
	}

	#[test]
	fn too_few_usable_rankings_keep_original_order() {
		// 2 usable rankings for a 20-candidate head is below the minimum;
		// the caller must leave vector order untouched.
		let entries = [entry(0, 0.9), entry(7, 0.8)];

		assert_eq!(rerank_order(20, 20, &entries, 3), None);
	}

	#[test]
	fn duplicate_and_out_of_range_entries_are_dropped() {
		let entries = [entry(1, 0.9), entry(1, 0.2), entry(9, 0.8), entry(0, 0.6)];
		let order = rerank_order(4, 2, &entries, 2).expect("expected a merged order");

		assert_eq!(order, vec![1, 0, 2, 3]);
	}

	#[test]
	fn unranked_head_members_keep_their_slot_after_the_ranked() {
		let entries = [entry(3, 0.9), entry(2, 0.8)];
		let order = rerank_order(6, 4, &entries, 2).expect("expected a merged order");

		assert_eq!(order, vec![3, 2, 0, 1, 4, 5]);
	}

	#[test]
	fn display_scores_descend_over_the_head_only() {
		assert_eq!(display_score(0, 3, 0.42), 1.0);
		assert_eq!(display_score(2, 3, 0.42), 0.98);
		assert_eq!(display_score(3, 3, 0.42), 0.42);
		assert_eq!(display_score(5, 0, 0.42), 0.42);
	}
}
