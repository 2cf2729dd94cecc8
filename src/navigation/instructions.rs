use serde::Serialize;

use super::geo::{distance_meters, format_distance};
use crate::models::Coordinate;
use crate::routing::NavigationStep;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionView {
    pub current_index: usize,
    pub current: String,
    pub next: Option<String>,
    pub distance_to_maneuver_text: String,
}

/// Picks the step whose start is nearest to `position`.
///
/// This is not a cursor: on loops or overlapping roads the nearest start can
/// belong to an earlier step, and the displayed instruction moves backwards.
pub fn select_current_step(steps: &[NavigationStep], position: &Coordinate) -> Option<InstructionView> {
    let (current_index, _) = steps
        .iter()
        .map(|s| distance_meters(position, &s.start_location))
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((i, d)),
        })?;

    let current = &steps[current_index];
    let next = steps.get(current_index + 1);

    let distance_to_maneuver_text = match next {
        Some(next) => format_distance(distance_meters(position, &next.start_location)),
        None => current
            .distance_text
            .clone()
            .unwrap_or_else(|| format_distance(current.distance_meters)),
    };

    Some(InstructionView {
        current_index,
        current: strip_markup(&current.instruction),
        next: next.map(|s| strip_markup(&s.instruction)),
        distance_to_maneuver_text,
    })
}

/// Removes every `<...>` run and collapses the whitespace left behind. A `<`
/// that is never closed is kept as text.
pub fn strip_markup(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    // pending tag text, starting at its `<`
    let mut tag: Option<String> = None;

    for c in text.chars() {
        match c {
            '>' if tag.is_some() => {
                tag = None;
                plain.push(' ');
            }
            '<' => {
                // an earlier `<` was not a tag after all
                if let Some(pending) = tag.replace(String::from('<')) {
                    plain.push_str(&pending);
                }
            }
            _ => match tag.as_mut() {
                Some(pending) => pending.push(c),
                None => plain.push(c),
            },
        }
    }
    if let Some(pending) = tag {
        plain.push_str(&pending);
    }

    plain
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
