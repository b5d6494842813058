use retro_types::models::{Phase, Retrospective};

/// Fixed transition table. `Discussing` loops on itself because finishing a
/// retro is a navigation step, not a phase. `Grouping` is never entered and
/// therefore never left.
pub fn next_phase(current: Phase) -> Phase {
    match current {
        Phase::Writing => Phase::Voting,
        Phase::Voting => Phase::Discussing,
        Phase::Discussing => Phase::Discussing,
        Phase::Grouping => Phase::Grouping,
    }
}

/// Returns a copy of `current` moved one step forward. Only `phase` changes.
pub fn advance_phase(current: &Retrospective) -> Retrospective {
    Retrospective {
        phase: next_phase(current.phase),
        ..current.clone()
    }
}

/// Items may only be added, edited or removed while writing.
pub fn accepts_items(phase: Phase) -> bool {
    phase == Phase::Writing
}

pub fn accepts_votes(phase: Phase) -> bool {
    phase == Phase::Voting
}
