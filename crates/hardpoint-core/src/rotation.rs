//! The objective-rotation tick.

use crate::announce::Announcer;
use crate::session::SessionDocument;

/// The objective after `current` in `objectives`, wrapping to the first.
///
/// An unknown or missing `current` also starts over at the first entry.
pub fn next_objective<'a>(objectives: &'a [String], current: Option<&str>) -> Option<&'a str> {
    let next_index = current
        .and_then(|name| objectives.iter().position(|o| o == name))
        .and_then(|i| i.checked_add(1))
        .filter(|&i| i < objectives.len())
        .unwrap_or(0);
    objectives.get(next_index).map(String::as_str)
}

/// Release every captor and advance to the next objective.
///
/// Returns the new objective, or `None` when no objectives are configured.
pub fn rotate(document: &mut SessionDocument, announcer: &Announcer) -> Option<String> {
    let next = next_objective(document.objectives(), document.active_objective())?.to_owned();
    document.release_all();
    document.set_active_objective(next.clone());
    announcer.announce(document.binding(), format!("the new hardpoint is [{next}]"));
    Some(next)
}
