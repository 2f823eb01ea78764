//! Per-token drag state machine.
//!
//! Transitions are pure: they look at a token (and, for moves and releases,
//! the rest of the surface) and return the next [`Interaction`] together with
//! the [`DragIntent`]s the session has to carry out.

use crate::input::{MouseButton, PointerId};
use crate::proximity::{candidate_at, overlaps};
use crate::token::{Token, TokenId, TokenSet};
use kurbo::{Point, Rect, Vec2};

/// Movement below this many pixels on both axes is a click, not a drag.
pub const JITTER_THRESHOLD: f64 = 10.0;

/// Interaction state of a token.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction {
    /// Resting on the surface.
    #[default]
    Idle,
    /// Following a pointer.
    Dragging(DragState),
    /// Waiting for the server to resolve a pairing request. Inert.
    Frozen,
}

/// Bookkeeping for an active drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    /// Pointer driving the drag.
    pub pointer: PointerId,
    /// Last pointer position seen.
    pub last: Point,
    /// Movement accumulated while still inside the jitter box.
    travel: Vec2,
    /// Whether the pointer ever left the jitter box.
    escaped: bool,
    /// Highlighted pairing candidate.
    pub candidate: Option<TokenId>,
}

impl DragState {
    fn new(pointer: PointerId, start: Point) -> Self {
        Self {
            pointer,
            last: start,
            travel: Vec2::ZERO,
            escaped: false,
            candidate: None,
        }
    }

    /// Whether the drag moved far enough to count as a real drag.
    pub fn has_moved(&self) -> bool {
        self.escaped
    }

    fn track(&mut self, delta: Vec2, jitter: f64) {
        if self.escaped {
            return;
        }
        self.travel += delta;
        if self.travel.x.abs() >= jitter || self.travel.y.abs() >= jitter {
            self.escaped = true;
        }
    }
}

/// A pointer press on a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Press {
    pub pointer: PointerId,
    pub position: Point,
    pub button: MouseButton,
    /// 2 for a double-press.
    pub clicks: u32,
}

impl Press {
    /// A single primary press.
    pub fn primary(pointer: PointerId, position: Point) -> Self {
        Self {
            pointer,
            position,
            button: MouseButton::Left,
            clicks: 1,
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DragIntent {
    /// Clear the "new" flag.
    MarkSeen,
    /// Bring the token to the front.
    Raise,
    /// Move the token by a raw pointer delta.
    MoveBy(Vec2),
    /// Switch the highlighted candidate.
    Highlight {
        from: Option<TokenId>,
        to: Option<TokenId>,
    },
    /// Spawn a sibling copy centred on a point.
    SpawnCopy { at: Point },
    /// Destroy the token.
    Destroy,
    /// Ask the server to combine the token with another.
    RequestPair { with: TokenId },
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: Interaction,
    pub intents: Vec<DragIntent>,
}

impl Step {
    fn stay(token: &Token) -> Self {
        Self {
            next: token.interaction.clone(),
            intents: Vec::new(),
        }
    }

    fn to(next: Interaction, intents: Vec<DragIntent>) -> Self {
        Self { next, intents }
    }
}

fn clear_highlight(candidate: Option<TokenId>) -> Option<DragIntent> {
    candidate.map(|from| DragIntent::Highlight { from: Some(from), to: None })
}

/// Handle a pointer press on `token`.
pub fn press(token: &Token, press: &Press) -> Step {
    if token.is_pairing() {
        return Step::stay(token);
    }

    match press.button {
        MouseButton::Right => {
            let mut intents = Vec::new();
            if let Interaction::Dragging(drag) = &token.interaction {
                intents.extend(clear_highlight(drag.candidate));
            }
            intents.push(DragIntent::Destroy);
            Step::to(Interaction::Idle, intents)
        }
        MouseButton::Middle if !token.is_new => Step {
            next: token.interaction.clone(),
            intents: vec![DragIntent::SpawnCopy { at: press.position }],
        },
        MouseButton::Middle => Step::stay(token),
        MouseButton::Left => {
            if token.is_dragging() {
                // Already held by another pointer
                return Step::stay(token);
            }
            if press.clicks >= 2 && !token.is_new {
                return Step {
                    next: token.interaction.clone(),
                    intents: vec![DragIntent::SpawnCopy { at: press.position }],
                };
            }
            Step::to(
                Interaction::Dragging(DragState::new(press.pointer, press.position)),
                vec![DragIntent::MarkSeen, DragIntent::Raise],
            )
        }
    }
}

/// Handle a pointer move while `token` is being dragged.
pub fn drag_to(token: &Token, to: Point, tokens: &TokenSet, max_distance: f64, jitter: f64) -> Step {
    let Interaction::Dragging(drag) = &token.interaction else {
        return Step::stay(token);
    };

    let mut drag = drag.clone();
    let delta = to - drag.last;
    drag.last = to;
    drag.track(delta, jitter);

    let anchor = token.position + delta;
    let bounds = Rect::from_origin_size(anchor, token.size);
    let candidate = candidate_at(tokens, token.id, anchor, bounds, max_distance);

    let mut intents = vec![DragIntent::MoveBy(delta)];
    if candidate != drag.candidate {
        intents.push(DragIntent::Highlight { from: drag.candidate, to: candidate });
        drag.candidate = candidate;
    }

    Step::to(Interaction::Dragging(drag), intents)
}

/// Handle the pointer release that ends a drag.
pub fn release(token: &Token, disposal: Option<Rect>) -> Step {
    let Interaction::Dragging(drag) = &token.interaction else {
        return Step::stay(token);
    };

    let mut intents: Vec<DragIntent> = clear_highlight(drag.candidate).into_iter().collect();

    if !drag.has_moved() {
        return Step::to(Interaction::Idle, intents);
    }

    if disposal.is_some_and(|zone| overlaps(token.bounds(), zone)) {
        intents.push(DragIntent::Destroy);
        return Step::to(Interaction::Idle, intents);
    }

    if let Some(with) = drag.candidate {
        intents.push(DragIntent::RequestPair { with });
    }
    Step::to(Interaction::Idle, intents)
}

/// Abandon a drag without dropping the token anywhere.
pub fn cancel(token: &Token) -> Step {
    let Interaction::Dragging(drag) = &token.interaction else {
        return Step::stay(token);
    };
    Step::to(Interaction::Idle, clear_highlight(drag.candidate).into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::proximity::MAX_PAIR_DISTANCE;
    use kurbo::Size;

    const P: PointerId = PointerId::MOUSE;

    fn surface() -> (TokenSet, TokenId, TokenId) {
        let mut set = TokenSet::new();
        let a = set.spawn(&CatalogEntry::new("🚧", "Kaputt"), Point::new(0.0, 0.0));
        let b = set.spawn(&CatalogEntry::new("🔗", "Verbindung"), Point::new(300.0, 0.0));
        set.set_size(a, Size::new(100.0, 40.0));
        set.set_size(b, Size::new(100.0, 40.0));
        (set, a, b)
    }

    /// Apply a step the way the session does, minus side effects on other tokens.
    fn apply(set: &mut TokenSet, id: TokenId, step: &Step) {
        let token = set.get_mut(id).unwrap();
        token.interaction = step.next.clone();
        for intent in &step.intents {
            match intent {
                DragIntent::MoveBy(delta) => token.position += *delta,
                DragIntent::MarkSeen => token.is_new = false,
                _ => {}
            }
        }
    }

    fn start_drag(set: &mut TokenSet, id: TokenId, at: Point) {
        let step = press(set.get(id).unwrap(), &Press::primary(P, at));
        apply(set, id, &step);
    }

    fn move_to(set: &mut TokenSet, id: TokenId, to: Point) -> Step {
        let step = drag_to(set.get(id).unwrap(), to, set, MAX_PAIR_DISTANCE, JITTER_THRESHOLD);
        apply(set, id, &step);
        step
    }

    #[test]
    fn test_primary_press_starts_drag() {
        let (set, a, _) = surface();
        let step = press(set.get(a).unwrap(), &Press::primary(P, Point::new(10.0, 10.0)));

        assert!(matches!(step.next, Interaction::Dragging(_)));
        assert_eq!(step.intents, vec![DragIntent::MarkSeen, DragIntent::Raise]);
    }

    #[test]
    fn test_frozen_token_ignores_everything() {
        let (mut set, a, _) = surface();
        set.freeze(a);
        let token = set.get(a).unwrap();

        for button in [MouseButton::Left, MouseButton::Right, MouseButton::Middle] {
            let p = Press { pointer: P, position: Point::new(5.0, 5.0), button, clicks: 1 };
            let step = press(token, &p);
            assert_eq!(step.next, Interaction::Frozen);
            assert!(step.intents.is_empty());
        }
    }

    #[test]
    fn test_right_press_destroys() {
        let (set, a, _) = surface();
        let p = Press { pointer: P, position: Point::new(5.0, 5.0), button: MouseButton::Right, clicks: 1 };
        let step = press(set.get(a).unwrap(), &p);
        assert_eq!(step.intents, vec![DragIntent::Destroy]);
    }

    #[test]
    fn test_copy_gestures_only_on_seen_tokens() {
        let (mut set, a, _) = surface();
        let middle = Press { pointer: P, position: Point::new(5.0, 5.0), button: MouseButton::Middle, clicks: 1 };
        let double = Press { clicks: 2, ..Press::primary(P, Point::new(5.0, 5.0)) };

        // New token: middle ignored, double-press just drags
        let step = press(set.get(a).unwrap(), &middle);
        assert!(step.intents.is_empty());
        let step = press(set.get(a).unwrap(), &double);
        assert!(matches!(step.next, Interaction::Dragging(_)));

        set.get_mut(a).unwrap().is_new = false;
        let token = set.get(a).unwrap();
        for p in [middle, double] {
            let step = press(token, &p);
            assert_eq!(step.next, Interaction::Idle);
            assert_eq!(step.intents, vec![DragIntent::SpawnCopy { at: Point::new(5.0, 5.0) }]);
        }
    }

    #[test]
    fn test_move_applies_raw_delta() {
        let (mut set, a, _) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        let step = move_to(&mut set, a, Point::new(35.0, 22.0));

        assert_eq!(step.intents[0], DragIntent::MoveBy(Vec2::new(25.0, 12.0)));
        assert_eq!(set.get(a).unwrap().position, Point::new(25.0, 12.0));
    }

    #[test]
    fn test_click_without_movement_is_noop() {
        let (mut set, a, _) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(13.0, 8.0));

        let step = release(set.get(a).unwrap(), None);
        assert_eq!(step.next, Interaction::Idle);
        assert!(step.intents.is_empty());
    }

    #[test]
    fn test_jitter_latch_survives_return_to_start() {
        let (mut set, a, _) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(40.0, 10.0));
        move_to(&mut set, a, Point::new(10.0, 10.0));

        match set.get(a).unwrap().interaction() {
            Interaction::Dragging(drag) => assert!(drag.has_moved()),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_highlight_follows_candidate() {
        let (mut set, a, b) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));

        let step = move_to(&mut set, a, Point::new(290.0, 15.0));
        assert!(step.intents.contains(&DragIntent::Highlight { from: None, to: Some(b) }));

        // Moving within the candidate does not re-emit
        let step = move_to(&mut set, a, Point::new(292.0, 15.0));
        assert_eq!(step.intents.len(), 1);

        let step = move_to(&mut set, a, Point::new(10.0, 10.0));
        assert!(step.intents.contains(&DragIntent::Highlight { from: Some(b), to: None }));
    }

    #[test]
    fn test_release_on_candidate_requests_pair() {
        let (mut set, a, b) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(300.0, 12.0));

        let step = release(set.get(a).unwrap(), None);
        assert_eq!(step.next, Interaction::Idle);
        assert_eq!(
            step.intents,
            vec![
                DragIntent::Highlight { from: Some(b), to: None },
                DragIntent::RequestPair { with: b },
            ]
        );
    }

    #[test]
    fn test_release_over_disposal_destroys() {
        let (mut set, a, _) = surface();
        let trash = Rect::new(0.0, 500.0, 400.0, 600.0);
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(10.0, 530.0));

        let step = release(set.get(a).unwrap(), Some(trash));
        assert_eq!(step.intents, vec![DragIntent::Destroy]);
    }

    #[test]
    fn test_release_in_empty_space() {
        let (mut set, a, _) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(10.0, 200.0));

        let step = release(set.get(a).unwrap(), None);
        assert_eq!(step.next, Interaction::Idle);
        assert!(step.intents.is_empty());
    }

    #[test]
    fn test_release_when_idle_is_ignored() {
        let (set, a, _) = surface();
        let step = release(set.get(a).unwrap(), None);
        assert_eq!(step.next, Interaction::Idle);
        assert!(step.intents.is_empty());
    }

    #[test]
    fn test_cancel_clears_highlight_without_pairing() {
        let (mut set, a, b) = surface();
        start_drag(&mut set, a, Point::new(10.0, 10.0));
        move_to(&mut set, a, Point::new(290.0, 15.0));

        let step = cancel(set.get(a).unwrap());
        assert_eq!(step.next, Interaction::Idle);
        assert_eq!(step.intents, vec![DragIntent::Highlight { from: Some(b), to: None }]);
    }
}
