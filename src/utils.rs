use rust_decimal::Decimal;

/// Column description generated by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Round half to even at 2 places and always show both decimals
pub fn format_2dp(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

pub fn format_optional(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), format_2dp)
}
