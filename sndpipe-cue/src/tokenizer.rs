// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-oriented cue-sheet tokenizer (spec.md §4.11, C11), grounded on
//! `original_source/cuesheet.cpp`'s `CueTokenizer<CharT>::nextline`: fields are whitespace-
//! separated, `"`-quoted fields may contain whitespace, and `""` inside a quoted field is
//! an escaped literal quote. A quote left open at the end of a line is a runaway string.

use sndpipe_core::error::malformed;
use sndpipe_core::Result;

/// Splits one physical line (no trailing `\n`/`\r`) into whitespace/quote-aware fields.
pub fn tokenize_line(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            loop {
                match chars.next() {
                    None => {
                        log::error!("cuesheet: runaway string at line {line_no}");
                        return malformed("runaway quoted string");
                    }
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            break;
                        }
                    }
                    Some(other) => field.push(other),
                }
            }
        } else if c == ' ' || c == '\t' {
            if !field.is_empty() {
                fields.push(std::mem::take(&mut field));
            }
            while matches!(chars.peek(), Some(' ') | Some('\t')) {
                chars.next();
            }
        } else {
            field.push(c);
        }
    }
    if !field.is_empty() {
        fields.push(field);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        let fields = tokenize_line("TRACK 01 AUDIO", 1).unwrap();
        assert_eq!(fields, vec!["TRACK", "01", "AUDIO"]);
    }

    #[test]
    fn quoted_field_keeps_internal_whitespace() {
        let fields = tokenize_line(r#"TITLE "Long Title Here""#, 1).unwrap();
        assert_eq!(fields, vec!["TITLE", "Long Title Here"]);
    }

    #[test]
    fn escaped_double_quote_becomes_a_literal_quote() {
        let fields = tokenize_line(r#"TITLE "She said ""hi""""#, 1).unwrap();
        assert_eq!(fields, vec!["TITLE", r#"She said "hi""#]);
    }

    #[test]
    fn unterminated_quote_is_a_runaway_string() {
        assert!(tokenize_line(r#"TITLE "unterminated"#, 4).is_err());
    }

    #[test]
    fn blank_line_yields_no_fields() {
        assert_eq!(tokenize_line("   ", 1).unwrap(), Vec::<String>::new());
    }
}
