//! Task document codec.
//!
//! The task document is a markdown file grouped into three fixed status
//! sections. Each task is a checkbox list item whose text may end with a
//! metadata tail:
//!
//! ```text
//! # Tasks
//!
//! ## Not Started
//!
//! - [ ] Buy milk | due:2024-01-15
//!
//! ## In Progress
//!
//! - [x] ~~Write report~~ | goal:g-123
//!
//! ## Done
//!
//! ```
//!
//! Parsed lines are kept in normalized form (`"[ ] rest"` / `"[x] rest"`);
//! the accessors below derive title, done flag and metadata from that form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Separator between the title and each metadata pair
pub const META_SEPARATOR: &str = " | ";

pub(crate) const STRIKE: &str = "~~";

/// One of the three canonical task sections, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::NotStarted, Section::InProgress, Section::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::NotStarted => "Not Started",
            Section::InProgress => "In Progress",
            Section::Done => "Done",
        }
    }

    /// Command-line spelling, as accepted by `FromStr`
    pub fn slug(self) -> &'static str {
        match self {
            Section::NotStarted => "not-started",
            Section::InProgress => "in-progress",
            Section::Done => "done",
        }
    }

    /// Exact header name match, as written in the document
    pub fn from_header(name: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.as_str() == name)
    }

    fn index(self) -> usize {
        match self {
            Section::NotStarted => 0,
            Section::InProgress => 1,
            Section::Done => 2,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = Error;

    /// Lenient parse for command-line input ("todo", "in-progress", "Done", ...)
    fn from_str(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "notstarted" | "todo" | "open" => Ok(Section::NotStarted),
            "inprogress" | "doing" | "wip" => Ok(Section::InProgress),
            "done" | "closed" => Ok(Section::Done),
            _ => Err(Error::InvalidArgument(format!(
                "unknown section '{value}' (expected not-started|in-progress|done)"
            ))),
        }
    }
}

/// Structured metadata carried in a line's tail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(rename = "goalId", skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    /// Stable line id; absent on legacy and hand-written lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The logical content of one task line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub done: bool,
    pub title: String,
    pub due: Option<String>,
    pub goal_id: Option<String>,
    pub id: Option<String>,
}

impl TaskEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            done: false,
            title: title.into(),
            due: None,
            goal_id: None,
            id: None,
        }
    }

    /// Decode a normalized line.
    pub fn parse(line: &str) -> Self {
        let meta = parse_task_meta(line);
        Self {
            done: is_task_done(line),
            title: task_title(line),
            due: meta.due,
            goal_id: meta.goal_id,
            id: meta.id,
        }
    }

    /// Encode back into a normalized line.
    pub fn to_line(&self) -> String {
        let prefix = if self.done { "[x] ~~" } else { "[ ] " };
        let mut line = String::from(prefix);
        line.push_str(&self.title.replace(STRIKE, ""));
        if self.done {
            line.push_str(STRIKE);
        }

        let suffix: Vec<String> = [
            self.due.as_deref().map(|due| format!("due:{due}")),
            self.goal_id.as_deref().map(|goal| format!("goal:{goal}")),
            self.id.as_deref().map(|id| format!("id:{id}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !suffix.is_empty() {
            line.push_str(META_SEPARATOR);
            line.push_str(&suffix.join(META_SEPARATOR));
        }
        line
    }
}

/// Build a normalized line from its parts.
///
/// Checked lines render the title struck through.
pub fn build_task_line(done: bool, title: &str, due: Option<&str>, goal_id: Option<&str>) -> String {
    TaskEntry {
        done,
        title: title.to_string(),
        due: due.map(str::to_string),
        goal_id: goal_id.map(str::to_string),
        id: None,
    }
    .to_line()
}

/// Whether `text` reads back unchanged when written into a line as the
/// title or a metadata value.
///
/// Besides the separator itself, an edge `|` next to a space would fuse
/// with the separator that follows (or precedes) it.
pub fn fits_task_line(text: &str) -> bool {
    text == text.trim()
        && !text.contains(['\n', '\r'])
        && !text.contains(META_SEPARATOR)
        && !text.contains(STRIKE)
        && !text.starts_with("| ")
        && !text.ends_with(" |")
}

/// Fresh stable line id (`t-<ulid>`)
pub fn generate_task_id() -> String {
    format!("t-{}", Ulid::new().to_string().to_lowercase())
}

/// A line is done iff it starts with `[x]` (any case).
pub fn is_task_done(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'[' && bytes[1].eq_ignore_ascii_case(&b'x') && bytes[2] == b']'
}

/// Title of a line: marker, strikethrough and metadata removed.
pub fn task_title(line: &str) -> String {
    let base = line_base(line);
    match base.find(META_SEPARATOR) {
        Some(pos) => base[..pos].trim().to_string(),
        None => base,
    }
}

/// Metadata of a line; unknown keys and pairs without a value are ignored.
pub fn parse_task_meta(line: &str) -> TaskMeta {
    let base = line_base(line);
    let mut meta = TaskMeta::default();
    let Some(pos) = base.find(META_SEPARATOR) else {
        return meta;
    };

    for pair in base[pos + META_SEPARATOR.len()..].split(META_SEPARATOR) {
        let Some((key, value)) = pair.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "due" => meta.due = Some(value.to_string()),
            "goal" | "goalId" => meta.goal_id = Some(value.to_string()),
            "id" => meta.id = Some(value.to_string()),
            _ => {}
        }
    }
    meta
}

/// Line text without its checkbox marker and strikethrough, trimmed.
fn line_base(line: &str) -> String {
    strip_marker(line).replace(STRIKE, "").trim().to_string()
}

/// Remove a leading `[x]`-style marker followed by whitespace.
///
/// Accepts an optional whitespace, an optional `x`, and an optional
/// whitespace between the brackets (`[ ]`, `[x]`, `[ x ]`, `[]`).
fn strip_marker(line: &str) -> &str {
    let mut chars = line.char_indices().peekable();
    if !matches!(chars.next(), Some((_, '['))) {
        return line;
    }
    if matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
        chars.next();
    }
    if matches!(chars.peek(), Some((_, 'x' | 'X'))) {
        chars.next();
    }
    if matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
        chars.next();
    }
    if !matches!(chars.next(), Some((_, ']'))) {
        return line;
    }

    let mut end = None;
    while let Some(&(idx, c)) = chars.peek() {
        if !c.is_whitespace() {
            break;
        }
        end = Some(idx + c.len_utf8());
        chars.next();
    }
    match end {
        Some(end) => &line[end..],
        None => line,
    }
}

/// The parsed task document: three sections of normalized lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDocument {
    sections: [Vec<String>; 3],
}

impl TaskDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text. Never fails; unrecognized lines are dropped.
    pub fn parse(content: &str) -> Self {
        let mut doc = Self::default();
        let mut current = Section::NotStarted;

        for raw in content.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if let Some(name) = parse_header(line) {
                if let Some(section) = Section::from_header(name) {
                    current = section;
                }
                continue;
            }

            if let Some(task) = parse_checkbox(line) {
                doc.section_mut(current).push(task);
            }
        }

        doc
    }

    /// Render the canonical form of the document.
    pub fn serialize(&self) -> String {
        let mut lines: Vec<String> = vec!["# Tasks".to_string(), String::new()];
        for section in Section::ALL {
            lines.push(format!("## {section}"));
            lines.push(String::new());
            for task in self.section(section) {
                lines.push(format!("- {task}"));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    pub fn section(&self, section: Section) -> &[String] {
        &self.sections[section.index()]
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Vec<String> {
        &mut self.sections[section.index()]
    }

    /// Sections in canonical order with their lines
    pub fn sections(&self) -> impl Iterator<Item = (Section, &[String])> {
        Section::ALL.into_iter().map(move |s| (s, self.section(s)))
    }

    pub fn get(&self, section: Section, index: usize) -> Option<&str> {
        self.section(section).get(index).map(String::as_str)
    }

    pub fn push(&mut self, section: Section, line: String) {
        self.section_mut(section).push(line);
    }

    pub fn push_front(&mut self, section: Section, line: String) {
        self.section_mut(section).insert(0, line);
    }

    pub fn remove(&mut self, section: Section, index: usize) -> Option<String> {
        let lines = self.section_mut(section);
        if index < lines.len() {
            Some(lines.remove(index))
        } else {
            None
        }
    }

    /// Replace a line in place, returning the previous one.
    pub fn replace(&mut self, section: Section, index: usize, line: String) -> Option<String> {
        self.section_mut(section)
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, line))
    }

    /// Total number of task lines
    pub fn len(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `## <Name>`: two hashes, at least one whitespace, non-empty name.
fn parse_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("##")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// `- [ ] rest` / `- [x] rest` into its normalized form.
fn parse_checkbox(line: &str) -> Option<String> {
    let rest = line.strip_prefix('-')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('[')?;

    let mut chars = rest.chars();
    let done = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let rest = chars.as_str().strip_prefix(']')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let text = rest.trim();
    if text.is_empty() {
        return None;
    }
    let marker = if done { "[x]" } else { "[ ]" };
    Some(format!("{marker} {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "# Tasks\n## Not Started\n- [ ] Call dentist\n## In Progress\n## Done\n- [x] ~~Pay rent~~ | due:2024-01-01\n";

    #[test]
    fn parses_scenario_document() {
        let doc = TaskDocument::parse(SCENARIO);
        assert_eq!(doc.section(Section::NotStarted), ["[ ] Call dentist"]);
        assert!(doc.section(Section::InProgress).is_empty());
        assert_eq!(doc.section(Section::Done), ["[x] ~~Pay rent~~ | due:2024-01-01"]);

        let done = &doc.section(Section::Done)[0];
        assert_eq!(task_title(done), "Pay rent");
        assert_eq!(
            parse_task_meta(done),
            TaskMeta {
                due: Some("2024-01-01".to_string()),
                ..TaskMeta::default()
            }
        );
        assert!(is_task_done(done));
    }

    #[test]
    fn lines_before_any_header_go_to_not_started() {
        let doc = TaskDocument::parse("- [ ] Early bird\n## Done\n- [x] Finished\n");
        assert_eq!(doc.section(Section::NotStarted), ["[ ] Early bird"]);
        assert_eq!(doc.section(Section::Done), ["[x] Finished"]);
    }

    #[test]
    fn unknown_headers_and_noise_are_ignored() {
        let text = "# Tasks\n\nSome prose\n## In Progress\n- [ ] Drafting\n## Someday\n- [ ] Still in progress\n* [ ] not a dash\n-[ ] no space\n- [?] odd marker\n";
        let doc = TaskDocument::parse(text);
        assert_eq!(
            doc.section(Section::InProgress),
            ["[ ] Drafting", "[ ] Still in progress"]
        );
        assert!(doc.section(Section::NotStarted).is_empty());
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn checkbox_marker_is_case_insensitive_and_trimmed() {
        let doc = TaskDocument::parse("-   [X]    Upper case   \r\n- [ ]   \n");
        assert_eq!(doc.section(Section::NotStarted), ["[x] Upper case"]);
    }

    #[test]
    fn every_section_is_present_for_empty_input() {
        let doc = TaskDocument::parse("");
        for (_, lines) in doc.sections() {
            assert!(lines.is_empty());
        }
        assert_eq!(doc.sections().count(), 3);
    }

    #[test]
    fn build_line_strikes_checked_titles() {
        assert_eq!(build_task_line(false, "Buy milk", Some("2024-01-15"), None), "[ ] Buy milk | due:2024-01-15");
        assert_eq!(build_task_line(true, "Write report", None, Some("g-123")), "[x] ~~Write report~~ | goal:g-123");
        assert_eq!(build_task_line(true, "Plain", None, None), "[x] ~~Plain~~");
        assert_eq!(
            build_task_line(false, "Both", Some("2024-03-01"), Some("g-9")),
            "[ ] Both | due:2024-03-01 | goal:g-9"
        );
    }

    #[test]
    fn build_line_strips_embedded_strikethrough() {
        let line = build_task_line(true, "~~sneaky~~ title", None, None);
        assert_eq!(line, "[x] ~~sneaky title~~");
        assert_eq!(task_title(&line), "sneaky title");
    }

    #[test]
    fn codec_round_trip_law() {
        let titles = ["Ship", "Call mom re: trip", "Ünïcode tâsk", "a", "|", "Pay rent|", "a |b"];
        let dues = [None, Some("2024-02-29")];
        let goals = [None, Some("g-01hzx"), Some("goal:with:colons")];

        for done in [true, false] {
            for title in titles {
                assert!(fits_task_line(title), "{title}");
                for due in dues {
                    for goal in goals {
                        let line = build_task_line(done, title, due, goal);
                        assert_eq!(task_title(&line), title, "title of {line}");
                        assert_eq!(is_task_done(&line), done, "done of {line}");
                        let meta = parse_task_meta(&line);
                        assert_eq!(meta.due.as_deref(), due, "due of {line}");
                        assert_eq!(meta.goal_id.as_deref(), goal, "goal of {line}");
                        assert_eq!(meta.id, None);
                    }
                }
            }
        }
    }

    #[test]
    fn edge_pipes_fall_outside_the_round_trip() {
        for text in ["Pay rent |", "| Pay rent", "a | b", "~~a", " a", "a\nb"] {
            assert!(!fits_task_line(text), "{text:?}");
        }

        // What such a title would do to the line
        let line = build_task_line(false, "Pay rent |", Some("2024-01-01"), None);
        assert_eq!(line, "[ ] Pay rent | | due:2024-01-01");
        assert_eq!(parse_task_meta(&line).due, None);

        let line = build_task_line(false, "x", Some("2024-01-01"), Some("g-1 |"));
        assert_eq!(parse_task_meta(&format!("{line} | id:t-1")).id, None);
    }

    #[test]
    fn meta_ignores_unknown_and_empty_pairs() {
        let meta = parse_task_meta("[ ] Title | prio:high | due: | nonsense | goal:g-2 | due:2024-05-05");
        assert_eq!(meta.due.as_deref(), Some("2024-05-05"));
        assert_eq!(meta.goal_id.as_deref(), Some("g-2"));
    }

    #[test]
    fn entry_round_trips_stable_id() {
        let mut entry = TaskEntry::new("Review PR");
        entry.due = Some("2024-02-01".to_string());
        entry.id = Some("t-01hq".to_string());
        let line = entry.to_line();
        assert_eq!(line, "[ ] Review PR | due:2024-02-01 | id:t-01hq");
        assert_eq!(TaskEntry::parse(&line), entry);
    }

    #[test]
    fn serialize_matches_on_disk_format() {
        let mut doc = TaskDocument::new();
        doc.push(Section::NotStarted, "[ ] Buy milk | due:2024-01-15".to_string());
        doc.push(Section::InProgress, "[x] ~~Write report~~ | goal:g-123".to_string());

        let expected = "# Tasks\n\n## Not Started\n\n- [ ] Buy milk | due:2024-01-15\n\n## In Progress\n\n- [x] ~~Write report~~ | goal:g-123\n\n## Done\n\n";
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let inputs = [
            SCENARIO,
            "",
            "random text\n- [ ] orphan\n## Done\n- [X] Shout | goal:g\n## In Progress\n- [ ] a | due:2024-01-01 | id:t-1\n",
        ];
        for input in inputs {
            let doc = TaskDocument::parse(input);
            assert_eq!(TaskDocument::parse(&doc.serialize()), doc);
        }
    }

    #[test]
    fn section_from_str_is_lenient() {
        assert_eq!("not-started".parse::<Section>().unwrap(), Section::NotStarted);
        assert_eq!("In Progress".parse::<Section>().unwrap(), Section::InProgress);
        assert_eq!("DONE".parse::<Section>().unwrap(), Section::Done);
        assert!("later".parse::<Section>().is_err());
    }

    #[test]
    fn replace_and_remove_respect_bounds() {
        let mut doc = TaskDocument::parse(SCENARIO);
        assert!(doc.replace(Section::InProgress, 0, "[ ] x".to_string()).is_none());
        assert!(doc.remove(Section::Done, 3).is_none());
        assert_eq!(doc.remove(Section::Done, 0).as_deref(), Some("[x] ~~Pay rent~~ | due:2024-01-01"));
    }
}
