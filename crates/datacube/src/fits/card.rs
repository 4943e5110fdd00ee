//! Header card parsing and formatting for the 80-byte FITS record.

use core::str;

use crate::error::{Error, Result};
use crate::header::{Card, Value};

/// FITS block size in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// FITS card (keyword record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards that fit in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Bytes needed to hold `num_bytes` rounded up to whole blocks.
pub const fn padded_byte_len(num_bytes: usize) -> usize {
    num_bytes.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Result of parsing one record: a card, or the END marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Card(Card),
    End,
}

/// Parse a single 80-byte card.
pub fn parse_card(bytes: &[u8; CARD_SIZE]) -> Result<Record> {
    let raw_keyword = &bytes[..8];
    for &b in raw_keyword {
        match b {
            b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_' => {}
            _ => return Err(Error::InvalidKeyword),
        }
    }
    let keyword = str::from_utf8(raw_keyword)
        .map_err(|_| Error::InvalidKeyword)?
        .trim_end()
        .to_string();

    if keyword == "END" {
        return Ok(Record::End);
    }

    let commentary = matches!(keyword.as_str(), "COMMENT" | "HISTORY" | "");
    if commentary || bytes[8] != b'=' || bytes[9] != b' ' {
        let text = str::from_utf8(&bytes[8..])
            .map_err(|_| Error::InvalidHeader("non-ASCII card text"))?
            .trim_end();
        return Ok(Record::Card(Card {
            keyword,
            value: None,
            comment: (!text.is_empty()).then(|| text.to_string()),
        }));
    }

    let (value, comment) = parse_value(&bytes[10..])?;
    Ok(Record::Card(Card {
        keyword,
        value,
        comment,
    }))
}

/// Parse the value field (bytes 10..80) into a value and optional comment.
fn parse_value(field: &[u8]) -> Result<(Option<Value>, Option<String>)> {
    let text = str::from_utf8(field).map_err(|_| Error::InvalidHeader("non-ASCII value"))?;
    let trimmed = text.trim_start();

    if let Some(rest) = trimmed.strip_prefix('\'') {
        let (value, remainder) = parse_string(rest);
        return Ok((Some(Value::String(value)), comment_after(remainder)));
    }

    let (body, comment) = match trimmed.find('/') {
        Some(i) => (&trimmed[..i], comment_text(&trimmed[i + 1..])),
        None => (trimmed, None),
    };
    let body = body.trim();
    if body.is_empty() {
        return Ok((None, comment));
    }

    let value = match body {
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ if is_integer_literal(body) => body
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| parse_float(body).map(Value::Float))?,
        _ => Value::Float(parse_float(body)?),
    };
    Ok((Some(value), comment))
}

fn is_integer_literal(text: &str) -> bool {
    !text.contains(['.', 'E', 'e', 'D', 'd'])
}

/// Parse a float literal, accepting the Fortran `D` exponent.
fn parse_float(text: &str) -> Result<f64> {
    text.replace(['D', 'd'], "E")
        .parse::<f64>()
        .map_err(|_| Error::InvalidHeader("unparseable numeric value"))
}

/// Parse a quoted string starting just after the opening quote. Returns the
/// value with trailing blanks removed and the text after the closing quote.
fn parse_string(text: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                value.push('\'');
                chars.next();
            } else {
                return (value.trim_end().to_string(), &text[i + 1..]);
            }
        } else {
            value.push(c);
        }
    }
    // unterminated: keep what we have
    (value.trim_end().to_string(), "")
}

fn comment_after(remainder: &str) -> Option<String> {
    remainder
        .find('/')
        .and_then(|i| comment_text(&remainder[i + 1..]))
}

fn comment_text(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Format a card into an 80-byte record.
pub fn format_card(card: &Card) -> Result<[u8; CARD_SIZE]> {
    let mut buf = [b' '; CARD_SIZE];
    let keyword = card.keyword.as_bytes();
    if keyword.len() > 8 || !keyword.is_ascii() {
        return Err(Error::InvalidKeyword);
    }
    buf[..keyword.len()].copy_from_slice(keyword);

    let mut field = String::new();
    match &card.value {
        Some(value) => {
            buf[8] = b'=';
            field.push_str(&format_value(value));
            if let Some(comment) = &card.comment {
                field.push_str(" / ");
                field.push_str(comment);
            }
            write_ascii(&mut buf[10..], &field);
        }
        None => {
            if let Some(comment) = &card.comment {
                write_ascii(&mut buf[8..], comment);
            }
        }
    }
    Ok(buf)
}

/// Fixed-format value text: numbers and logicals right-justified to
/// column 30, strings quoted and padded to at least eight characters.
fn format_value(value: &Value) -> String {
    match value {
        Value::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        Value::Integer(n) => format!("{n:>20}"),
        Value::Float(x) => format!("{:>20}", format_float(*x)),
        Value::String(s) => {
            let escaped = s.replace('\'', "''");
            format!("'{escaped:<8}'")
        }
    }
}

fn format_float(x: f64) -> String {
    if x == 0.0 {
        return "0.0".to_string();
    }
    let mut precision = 15usize;
    loop {
        let s = format!("{:.prec$E}", x, prec = precision);
        if s.len() <= 20 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

fn write_ascii(dest: &mut [u8], text: &str) {
    let bytes: Vec<u8> = text
        .bytes()
        .map(|b| if b.is_ascii_graphic() { b } else { b' ' })
        .take(dest.len())
        .collect();
    dest[..bytes.len()].copy_from_slice(&bytes);
}

/// Parse header blocks starting at the beginning of `data`. Returns the cards
/// and the number of bytes the header occupies (a multiple of the block
/// size).
pub fn parse_header(data: &[u8]) -> Result<(Vec<Card>, usize)> {
    let mut cards = Vec::new();
    let mut offset = 0;
    while offset + CARD_SIZE <= data.len() {
        let bytes: &[u8; CARD_SIZE] = data[offset..offset + CARD_SIZE]
            .try_into()
            .map_err(|_| Error::UnexpectedEof)?;
        offset += CARD_SIZE;
        match parse_card(bytes)? {
            Record::End => return Ok((cards, padded_byte_len(offset))),
            Record::Card(card) => cards.push(card),
        }
    }
    Err(Error::UnexpectedEof)
}

/// Serialize cards followed by END, padded with blanks to whole blocks.
pub fn serialize_header(cards: &[Card]) -> Result<Vec<u8>> {
    let total = padded_byte_len((cards.len() + 1) * CARD_SIZE);
    let mut buf = Vec::with_capacity(total);
    for card in cards {
        buf.extend_from_slice(&format_card(card)?);
    }
    let mut end = [b' '; CARD_SIZE];
    end[..3].copy_from_slice(b"END");
    buf.extend_from_slice(&end);
    buf.resize(total, b' ');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        buf[..text.len()].copy_from_slice(text.as_bytes());
        buf
    }

    fn card_of(text: &str) -> Card {
        match parse_card(&record(text)).unwrap() {
            Record::Card(c) => c,
            Record::End => panic!("unexpected END"),
        }
    }

    #[test]
    fn parse_integer_with_comment() {
        let c = card_of("NAXIS   =                    3 / number of axes");
        assert_eq!(c.keyword, "NAXIS");
        assert_eq!(c.value, Some(Value::Integer(3)));
        assert_eq!(c.comment.as_deref(), Some("number of axes"));
    }

    #[test]
    fn parse_float_with_d_exponent() {
        let c = card_of("RESTFRQ =       1.15271202D+11");
        assert_eq!(c.value, Some(Value::Float(1.15271202e11)));
    }

    #[test]
    fn parse_string_with_quote_and_comment() {
        let c = card_of("OBJECT  = 'O''Brien  '          / target");
        assert_eq!(c.value, Some(Value::String("O'Brien".into())));
        assert_eq!(c.comment.as_deref(), Some("target"));
    }

    #[test]
    fn parse_string_with_slash_inside() {
        let c = card_of("BUNIT   = 'Jy/beam '");
        assert_eq!(c.value, Some(Value::String("Jy/beam".into())));
        assert!(c.comment.is_none());
    }

    #[test]
    fn parse_logical_and_commentary() {
        assert_eq!(
            card_of("SIMPLE  =                    T").value,
            Some(Value::Logical(true))
        );
        let c = card_of("HISTORY reprojected onto galactic grid");
        assert!(c.is_commentary());
        assert_eq!(c.comment.as_deref(), Some("reprojected onto galactic grid"));
    }

    #[test]
    fn parse_end_and_bad_keyword() {
        assert_eq!(parse_card(&record("END")).unwrap(), Record::End);
        assert!(matches!(
            parse_card(&record("naxis   =                    3")),
            Err(Error::InvalidKeyword)
        ));
    }

    #[test]
    fn format_then_parse_preserves_values() {
        let cards = vec![
            Card::new("BITPIX", -32),
            Card::new("CDELT3", -1234.5678),
            Card::new("CTYPE3", "VRAD"),
            Card {
                keyword: "BUNIT".into(),
                value: Some(Value::from("K")),
                comment: Some("brightness".into()),
            },
        ];
        for card in &cards {
            let parsed = match parse_card(&format_card(card).unwrap()).unwrap() {
                Record::Card(c) => c,
                Record::End => panic!("unexpected END"),
            };
            assert_eq!(&parsed, card);
        }
    }

    #[test]
    fn serialized_header_is_block_aligned() {
        let cards: Vec<Card> = (0..40i64).map(|i| Card::new(format!("KEY{i}"), i)).collect();
        let bytes = serialize_header(&cards).unwrap();
        assert_eq!(bytes.len(), 2 * BLOCK_SIZE);
        let (parsed, len) = parse_header(&bytes).unwrap();
        assert_eq!(len, 2 * BLOCK_SIZE);
        assert_eq!(parsed, cards);
    }

    #[test]
    fn end_card_can_close_a_full_block() {
        let cards: Vec<Card> = (0..CARDS_PER_BLOCK as i64 - 1)
            .map(|i| Card::new(format!("KEY{i}"), i))
            .collect();
        assert_eq!(serialize_header(&cards).unwrap().len(), BLOCK_SIZE);
        let cards: Vec<Card> = (0..CARDS_PER_BLOCK as i64)
            .map(|i| Card::new(format!("KEY{i}"), i))
            .collect();
        assert_eq!(serialize_header(&cards).unwrap().len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn header_without_end_is_truncated() {
        let bytes = vec![b' '; BLOCK_SIZE];
        assert!(matches!(parse_header(&bytes), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn long_keyword_is_rejected_on_format() {
        assert!(matches!(
            format_card(&Card::new("TOOLONGKEY", 1)),
            Err(Error::InvalidKeyword)
        ));
    }
}
