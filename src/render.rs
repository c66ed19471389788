//! Maps a turn's text to display blocks, one block per line.

use crate::models::Turn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.)(.*)$").expect("invalid numbered-line regex"));

const BULLET: char = '•';
const SUB_BULLET: char = '-';

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Bullet { text: String },
    SubBullet { text: String },
    Numbered { label: String, text: String },
    Spacing,
    Paragraph { text: String },
}

/// Classifies a single line by its leading characters. Markers must be at
/// column zero; an indented `  - item` is a paragraph.
pub fn classify_line(line: &str) -> Block {
    if let Some(rest) = line.strip_prefix(BULLET) {
        return Block::Bullet {
            text: rest.trim().to_string(),
        };
    }
    if let Some(rest) = line.strip_prefix(SUB_BULLET) {
        return Block::SubBullet {
            text: rest.trim().to_string(),
        };
    }
    if let Some(caps) = NUMBERED_RE.captures(line) {
        return Block::Numbered {
            label: caps[1].to_string(),
            text: caps[2].trim().to_string(),
        };
    }
    if line.trim().is_empty() {
        return Block::Spacing;
    }
    Block::Paragraph {
        text: line.to_string(),
    }
}

pub fn render_text(text: &str) -> Vec<Block> {
    text.split('\n').map(classify_line).collect()
}

/// Rendered form of one turn. Reasoning is only rendered when requested and
/// present.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RenderedTurn {
    pub content: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<Block>>,
}

pub fn render_turn(turn: &Turn, show_reasoning: bool) -> RenderedTurn {
    let reasoning = match turn.reasoning() {
        Some(r) if show_reasoning => Some(render_text(r)),
        _ => None,
    };
    RenderedTurn {
        content: render_text(turn.content()),
        reasoning,
    }
}
