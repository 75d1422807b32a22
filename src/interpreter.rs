//! Best-effort structuring of free-text landmark replies.
//!
//! Model replies loosely follow a `Name: / Location: / introduction` shape.
//! Known labels are looked for at the start of lines; whatever is left over
//! becomes the introduction. Parsing never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rendered for fields the reply did not contain.
pub const PLACEHOLDER: &str = "—";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParsedLandmark {
  pub name: String,
  pub location: String,
  pub introduction: String,
}

impl ParsedLandmark {
  fn placeholders() -> Self {
    Self {
      name: PLACEHOLDER.to_string(),
      location: PLACEHOLDER.to_string(),
      introduction: PLACEHOLDER.to_string(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
  Name,
  Location,
  Introduction,
}

// Evaluated top to bottom for every line.
const LABELS: &[(Field, &[&str])] = &[
  (
    Field::Name,
    &["Name", "Landmark", "Landmark Name", "名称", "名字", "地标", "地标名称"],
  ),
  (
    Field::Location,
    &[
      "Location",
      "City, Country",
      "City/Country",
      "City",
      "Country",
      "位置",
      "地点",
      "所在地",
      "城市",
      "国家",
      "城市、国家",
    ],
  ),
  (
    Field::Introduction,
    &["Introduction", "Description", "About", "简介", "介绍"],
  ),
];

static MATCHERS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
  LABELS
    .iter()
    .map(|(field, labels)| (*field, label_regex(labels)))
    .collect()
});

fn label_regex(labels: &[&str]) -> Regex {
  let mut labels = labels.to_vec();
  labels.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
  let alternatives = labels
    .iter()
    .map(|l| regex::escape(l))
    .collect::<Vec<_>>()
    .join("|");
  // Optional list/heading/bold decoration, the label, then `:` or `：`.
  let pattern = format!(r"(?i)^\s*(?:[-*#>]+\s*)*(?:{alternatives})\s*\**\s*[:：](.*)$");
  Regex::new(&pattern).expect("label patterns are static and valid")
}

fn clean_value(value: &str) -> String {
  value.trim().trim_matches('*').trim().to_string()
}

fn or_placeholder(value: Option<String>) -> String {
  match value {
    Some(v) if !v.is_empty() => v,
    _ => PLACEHOLDER.to_string(),
  }
}

/// Split a raw reply into name, location and introduction.
///
/// Only the first line per label group is used. If removing the label lines
/// leaves nothing, the whole reply becomes the introduction.
pub fn parse_landmark(raw: &str) -> ParsedLandmark {
  if raw.trim().is_empty() {
    return ParsedLandmark::placeholders();
  }

  let mut name: Option<String> = None;
  let mut location: Option<String> = None;
  let mut introduction_label_seen = false;
  let mut consumed_any = false;
  let mut body: Vec<String> = Vec::new();

  'lines: for line in raw.lines() {
    for (field, matcher) in MATCHERS.iter() {
      let open = match field {
        Field::Name => name.is_none(),
        Field::Location => location.is_none(),
        Field::Introduction => !introduction_label_seen,
      };
      if !open {
        continue;
      }
      let Some(caps) = matcher.captures(line) else {
        continue;
      };
      let value = clean_value(caps.get(1).map_or("", |m| m.as_str()));
      consumed_any = true;
      match field {
        Field::Name => name = Some(value),
        Field::Location => location = Some(value),
        Field::Introduction => {
          introduction_label_seen = true;
          if !value.is_empty() {
            body.push(value);
          }
        }
      }
      continue 'lines;
    }
    body.push(line.to_string());
  }

  if !consumed_any {
    return ParsedLandmark {
      name: PLACEHOLDER.to_string(),
      location: PLACEHOLDER.to_string(),
      introduction: raw.trim().to_string(),
    };
  }

  let introduction = body.join("\n").trim().to_string();
  let introduction = if introduction.is_empty() {
    raw.trim().to_string()
  } else {
    introduction
  };

  ParsedLandmark {
    name: or_placeholder(name),
    location: or_placeholder(location),
    introduction,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labelled_reply_is_split_into_fields() {
    let parsed =
      parse_landmark("Name: Eiffel Tower\nLocation: Paris, France\nA 19th-century iron tower.");
    assert_eq!(
      parsed,
      ParsedLandmark {
        name: "Eiffel Tower".to_string(),
        location: "Paris, France".to_string(),
        introduction: "A 19th-century iron tower.".to_string(),
      }
    );
  }

  #[test]
  fn unstructured_reply_becomes_introduction() {
    let text = "This looks like a generic office building, not a recognizable landmark.";
    let parsed = parse_landmark(text);
    assert_eq!(parsed.name, PLACEHOLDER);
    assert_eq!(parsed.location, PLACEHOLDER);
    assert_eq!(parsed.introduction, text);
  }

  #[test]
  fn unstructured_multiline_reply_is_kept_verbatim_modulo_trim() {
    let text = "  First paragraph.\r\n\r\nSecond paragraph.\n";
    let parsed = parse_landmark(text);
    assert_eq!(parsed.introduction, text.trim());
  }

  #[test]
  fn empty_input_yields_placeholders() {
    for raw in ["", "   \n\t "] {
      let parsed = parse_landmark(raw);
      assert_eq!(parsed.name, PLACEHOLDER);
      assert_eq!(parsed.location, PLACEHOLDER);
      assert_eq!(parsed.introduction, PLACEHOLDER);
    }
  }

  #[test]
  fn parsing_is_deterministic() {
    let raw = "Name: Colosseum\nLocation: Rome, Italy\nAn ancient amphitheatre.";
    assert_eq!(parse_landmark(raw), parse_landmark(raw));
  }

  #[test]
  fn name_value_is_trimmed() {
    let parsed = parse_landmark("Name:    Big Ben   \nA clock tower.");
    assert_eq!(parsed.name, "Big Ben");
  }

  #[test]
  fn labels_mid_sentence_do_not_match() {
    let raw = "The tower's Name: is often mistranslated.\nIts Location: varies by source.";
    let parsed = parse_landmark(raw);
    assert_eq!(parsed.name, PLACEHOLDER);
    assert_eq!(parsed.location, PLACEHOLDER);
    assert_eq!(parsed.introduction, raw);
  }

  #[test]
  fn chinese_labels_with_full_width_colon() {
    let parsed = parse_landmark("名称：埃菲尔铁塔\n位置：法国巴黎\n一座建于19世纪的铁塔。");
    assert_eq!(parsed.name, "埃菲尔铁塔");
    assert_eq!(parsed.location, "法国巴黎");
    assert_eq!(parsed.introduction, "一座建于19世纪的铁塔。");
  }

  #[test]
  fn labels_are_case_insensitive_and_may_be_indented() {
    let parsed = parse_landmark("   NAME: Taj Mahal\n  city, country: Agra, India\nA mausoleum.");
    assert_eq!(parsed.name, "Taj Mahal");
    assert_eq!(parsed.location, "Agra, India");
    assert_eq!(parsed.introduction, "A mausoleum.");
  }

  #[test]
  fn markdown_decorated_labels_match() {
    let parsed = parse_landmark(
      "**Name:** Sydney Opera House\n- **Location**: Sydney, Australia\n\nA performing arts centre.",
    );
    assert_eq!(parsed.name, "Sydney Opera House");
    assert_eq!(parsed.location, "Sydney, Australia");
    assert_eq!(parsed.introduction, "A performing arts centre.");
  }

  #[test]
  fn only_first_matching_line_is_used() {
    let parsed = parse_landmark("Name: Louvre\nName: Louvre Pyramid\nA museum.");
    assert_eq!(parsed.name, "Louvre");
    assert_eq!(parsed.introduction, "Name: Louvre Pyramid\nA museum.");
  }

  #[test]
  fn reply_made_only_of_labels_falls_back_to_raw_text() {
    let raw = "Name: Golden Gate Bridge\nLocation: San Francisco, USA";
    let parsed = parse_landmark(raw);
    assert_eq!(parsed.name, "Golden Gate Bridge");
    assert_eq!(parsed.location, "San Francisco, USA");
    assert_eq!(parsed.introduction, raw);
  }

  #[test]
  fn introduction_label_is_stripped_but_content_kept() {
    let parsed = parse_landmark(
      "Name: Great Wall\nLocation: China\nIntroduction: A series of fortifications.\nBuilt over centuries.",
    );
    assert_eq!(
      parsed.introduction,
      "A series of fortifications.\nBuilt over centuries."
    );
  }

  #[test]
  fn missing_location_defaults_to_placeholder() {
    let parsed = parse_landmark("Landmark: Statue of Liberty\nA gift from France.");
    assert_eq!(parsed.name, "Statue of Liberty");
    assert_eq!(parsed.location, PLACEHOLDER);
    assert_eq!(parsed.introduction, "A gift from France.");
  }

  #[test]
  fn empty_label_value_defaults_to_placeholder() {
    let parsed = parse_landmark("Name:\nSomething tall.");
    assert_eq!(parsed.name, PLACEHOLDER);
    assert_eq!(parsed.introduction, "Something tall.");
  }
}
