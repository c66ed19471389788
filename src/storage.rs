use crate::models::{NewTurn, Turn};

/// In-memory, append-only list of turns for one session.
///
/// There is no update or delete-by-id: turns are immutable once appended and
/// the only way to remove anything is to `clear` the whole conversation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a fresh id, appends the turn at the end, and returns it.
    pub fn append(&mut self, turn: NewTurn) -> Turn {
        let turn = Turn::from_new(turn);
        log::debug!(
            "Appending {} turn {} (position {})",
            turn.role().as_str(),
            turn.id(),
            self.turns.len()
        );
        self.turns.push(turn.clone());
        turn
    }

    pub fn clear(&mut self) {
        log::info!("Clearing conversation ({} turns)", self.turns.len());
        self.turns.clear();
    }

    /// Snapshot of all turns in insertion order.
    pub fn all(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParsedResponse, Role};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn append_preserves_order_and_assigns_distinct_ids() {
        let mut store = ConversationStore::new();
        let appended: Vec<Turn> = (0..25)
            .map(|i| store.append(NewTurn::user(format!("message {i}"))))
            .collect();

        let all = store.all();
        assert_eq!(all, appended);
        let contents: Vec<&str> = all.iter().map(|t| t.content()).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("message {i}")).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());

        let ids: HashSet<_> = all.iter().map(|t| t.id()).collect();
        assert_eq!(ids.len(), 25);
    }

    #[test]
    fn clear_empties_regardless_of_prior_state() {
        let mut store = ConversationStore::new();
        store.clear();
        assert!(store.all().is_empty());

        store.append(NewTurn::user("hi"));
        store.append(NewTurn::assistant_error("sorry", "boom"));
        store.clear();
        assert!(store.all().is_empty());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_appends() {
        let mut store = ConversationStore::new();
        store.append(NewTurn::user("first"));
        let snapshot = store.all();
        store.append(NewTurn::user("second"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn assistant_turn_drops_empty_reasoning() {
        let mut store = ConversationStore::new();
        let turn = store.append(NewTurn::assistant(ParsedResponse {
            reasoning: String::new(),
            answer: "hello".to_string(),
            used_fallback: false,
        }));
        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(turn.reasoning(), None);
        assert_eq!(turn.error(), None);
        assert_eq!(store.all()[0].id(), turn.id());
    }
}
