use tracing::debug;
use uuid::Uuid;

use retro_types::models::RetroItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    AlreadyVoted,
}

pub fn has_voted(item: &RetroItem, user_id: Uuid) -> bool {
    item.voters.contains(&user_id)
}

/// Count one vote from `user_id`. A repeat vote leaves the item untouched.
///
/// Keeps `votes == voters.len()` as long as the item satisfied it on entry.
pub fn record_vote(item: &mut RetroItem, user_id: Uuid) -> VoteOutcome {
    if has_voted(item, user_id) {
        debug!("user {} already voted on item {}", user_id, item.id);
        return VoteOutcome::AlreadyVoted;
    }

    item.voters.push(user_id);
    item.votes += 1;
    debug_assert_eq!(item.votes as usize, item.voters.len());
    VoteOutcome::Recorded
}
