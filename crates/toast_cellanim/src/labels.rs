//! Label headers (`rcad_<name>_labels.h`)
//!
//! RVL cellanims carry no animation names. The names, and an optional comment for each, live in a
//! C header stored next to the `.brcad`, one define per animation:
//!
//! ```text
//! #define BEAT	0	// first beat
//! #define IDLE	1	// (null)
//! ```
//!
//! The header is Shift-JIS encoded.

use encoding_rs::SHIFT_JIS;
use tracing::{instrument, warn};

use crate::error::{Error, Result};
use crate::model::Animation;

const NO_COMMENT: &str = "(null)";

/// One `#define` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub index: usize,
    pub comment: Option<String>,
}

/// Name of the label header of the cellanim `name`
pub fn file_name(name: &str) -> String {
    format!("rcad_{name}_labels.h")
}

fn parse_line(line: &str) -> Option<Label> {
    let rest = line.trim().strip_prefix("#define")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    let name_end = rest.find(char::is_whitespace)?;
    let (name, rest) = rest.split_at(name_end);

    let rest = rest.trim_start();
    let index_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let index = rest[..index_end].parse().ok()?;

    let comment = rest[index_end..]
        .trim_start()
        .strip_prefix("//")
        .map(str::trim)
        .filter(|c| *c != NO_COMMENT)
        .map(str::to_owned);

    Some(Label {
        name: name.to_owned(),
        index,
        comment,
    })
}

/// Read every label define of a header; other lines are ignored
#[instrument(skip(data))]
pub fn parse(data: &[u8]) -> Vec<Label> {
    let (text, _, had_errors) = SHIFT_JIS.decode(data);
    if had_errors {
        warn!("label header is not valid Shift-JIS, unreadable bytes were replaced");
    }
    text.lines().filter_map(parse_line).collect()
}

/// Copy names and comments onto the animations they index
pub fn apply(labels: &[Label], animations: &mut [Animation]) {
    for label in labels {
        match animations.get_mut(label.index) {
            Some(animation) => {
                animation.name.clone_from(&label.name);
                animation.comment.clone_from(&label.comment);
            }
            None => warn!(
                name = %label.name,
                index = label.index,
                "label points past the last animation"
            ),
        }
    }
}

/// Build the label header for `animations`, in index order
///
/// Animations without a name get no define. A define name ends at the first whitespace, so
/// names holding any are rejected, as are comments spanning lines.
#[instrument(skip(animations), err)]
pub fn generate(animations: &[Animation]) -> Result<Vec<u8>> {
    let mut text = String::new();
    for (index, animation) in animations.iter().enumerate() {
        if animation.name.is_empty() {
            continue;
        }
        let multiline = animation
            .comment
            .as_deref()
            .is_some_and(|c| c.contains(['\r', '\n']));
        if animation.name.contains(char::is_whitespace) || multiline {
            return Err(Error::LabelName(animation.name.clone()));
        }
        let comment = animation.comment.as_deref().unwrap_or(NO_COMMENT);
        text.push_str(&format!(
            "#define {}\t{index}\t// {comment}\n",
            animation.name
        ));
    }

    let (bytes, _, unmappable) = SHIFT_JIS.encode(&text);
    if unmappable {
        let culprit = animations
            .iter()
            .find(|a| {
                let comment = a.comment.as_deref().unwrap_or_default();
                SHIFT_JIS.encode(&a.name).2 || SHIFT_JIS.encode(comment).2
            })
            .map(|a| a.name.clone())
            .unwrap_or_default();
        return Err(Error::LabelEncoding(culprit));
    }
    Ok(bytes.into_owned())
}
