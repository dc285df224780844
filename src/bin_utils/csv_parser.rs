use std::io::Read;

use crate::{account::AccountId, command::OperationKind};
use csv::{Position, StringRecord, StringRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct IntentRecord {
    pub account: AccountId,
    pub operation: OperationKind,
    pub amount: Option<Decimal>,
}

/// Parses mutation intents in CSV format, with an `account,operation,amount`
/// header. Yields the line number of every record together with the parse
/// result, so one malformed row does not stop the rest of the file.
pub struct CsvIntentParser<R> {
    headers: StringRecord,
    records: StringRecordsIntoIter<R>,
}

impl<R> CsvIntentParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }
}

impl<R> Iterator for CsvIntentParser<R>
where
    R: Read,
{
    type Item = (u64, Result<IntentRecord, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.records.next()? {
            Ok(record) => (
                record.position().map_or(0, Position::line),
                record.deserialize(Some(&self.headers)),
            ),
            Err(err) => (err.position().map_or(0, Position::line), Err(err)),
        };
        Some(item)
    }
}
