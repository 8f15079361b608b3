//! Plain-text record sources.
//!
//! Both sources read whitespace separated `mass specific_heat temperature_difference` triples.

use std::io::{self, prelude::*};

use log;

use crate::record::Record;

/// Reads records from a text file body.
/// Parsing stops at the first incomplete or malformed triple.
pub fn read_text_records<R: Read>(mut reader: R) -> io::Result<Vec<Record>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;

    let mut fields = content.split_whitespace().map(|field| field.parse::<f64>());
    let mut records = Vec::new();

    while let (Some(Ok(mass)), Some(Ok(specific_heat)), Some(Ok(temperature_difference))) =
        (fields.next(), fields.next(), fields.next())
    {
        records.push(Record::new(mass, specific_heat, temperature_difference));
    }
    log::debug!("{} records parsed from text", records.len());

    return Ok(records);
}

/// Reads records typed in interactively.
///
/// Input is consumed line by line, so entry ends as soon as a terminator is typed: a token that
/// is not a number, a record with a zero mass, or the end of the stream. An incomplete trailing
/// triple is dropped.
pub fn read_keyboard_records<R: BufRead>(reader: R) -> io::Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut fields = Vec::with_capacity(3);

    for line in reader.lines() {
        for token in line?.split_whitespace() {
            match token.parse::<f64>() {
                Ok(value) => fields.push(value),
                Err(_) => return Ok(records),
            }

            if fields.len() == 3 {
                let record = Record::new(fields[0], fields[1], fields[2]);
                if record.mass == 0.0 {
                    return Ok(records);
                }
                records.push(record);
                fields.clear();
            }
        }
    }

    return Ok(records);
}
