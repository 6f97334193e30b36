use std::collections::BTreeMap;

use crate::{error::ParseError, types::ReadingFields};

pub const KEY_TEMPERATURE: &str = "bme_temp";
pub const KEY_PRESSURE: &str = "bme_press";
pub const KEY_GAS: &str = "bme_gas";
pub const KEY_CO2: &str = "scd_co2";
pub const KEY_HUMIDITY: &str = "scd_hum";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryValue {
    Integer(i64),
    Real(f64),
}

impl TelemetryValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Real(value) => value,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(value),
            Self::Real(value) if value.is_finite() => Some(value.round() as i64),
            Self::Real(_) => None,
        }
    }
}

/// Every coercible `key: value` token of a line, unrecognized keys included.
pub type TelemetryFields = BTreeMap<String, TelemetryValue>;

/// Splits a device line such as `BME_Temp: 21.4, SCD_CO2: 612` into numeric
/// fields. Tokens without a `:` or whose value is not numeric are skipped.
pub fn parse_line(line: &str) -> TelemetryFields {
    let mut fields = TelemetryFields::new();

    for token in line.trim().split(',') {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        let parsed = if value.contains('.') {
            value.parse::<f64>().ok().map(TelemetryValue::Real)
        } else {
            value.parse::<i64>().ok().map(TelemetryValue::Integer)
        };

        if let Some(parsed) = parsed {
            fields.insert(key, parsed);
        }
    }

    fields
}

impl TryFrom<&TelemetryFields> for ReadingFields {
    type Error = ParseError;

    fn try_from(fields: &TelemetryFields) -> Result<Self, Self::Error> {
        if fields.is_empty() {
            return Err(ParseError::Empty);
        }

        let real = |key: &str| fields.get(key).map(|value| value.as_f64());
        let reading = ReadingFields {
            temperature: real(KEY_TEMPERATURE),
            pressure: real(KEY_PRESSURE),
            gas: real(KEY_GAS),
            co2: fields.get(KEY_CO2).and_then(|value| value.as_i64()),
            humidity: real(KEY_HUMIDITY),
        };

        if reading.is_empty() {
            let seen = fields.keys().cloned().collect::<Vec<_>>().join(", ");
            return Err(ParseError::Unrecognized(seen));
        }

        Ok(reading)
    }
}

pub fn parse_reading(line: &str) -> Result<ReadingFields, ParseError> {
    ReadingFields::try_from(&parse_line(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_device_line() {
        let reading = parse_reading(
            "BME_Temp: 21.48, BME_Press: 1013.2, BME_Gas: 52.1, SCD_CO2: 612, SCD_Hum: 41.0",
        )
        .unwrap();

        assert_eq!(
            reading,
            ReadingFields {
                temperature: Some(21.48),
                pressure: Some(1013.2),
                gas: Some(52.1),
                co2: Some(612),
                humidity: Some(41.0),
            }
        );
    }

    #[test]
    fn integer_values_widen_for_real_fields() {
        let reading = parse_reading("bme_temp: 22").unwrap();
        assert_eq!(reading.temperature, Some(22.0));
        assert_eq!(reading.humidity, None);
    }

    #[test]
    fn drops_uncoercible_tokens_but_keeps_the_rest() {
        let fields = parse_line("bme_temp: warm, scd_hum: 40.5, garbage, scd_co2: 5.5.5");

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("scd_hum"), Some(&TelemetryValue::Real(40.5)));
    }

    #[test]
    fn keeps_unknown_keys_in_mapping_only() {
        let fields = parse_line("lux: 300, bme_gas: 12.5");
        assert_eq!(fields.get("lux"), Some(&TelemetryValue::Integer(300)));

        let reading = ReadingFields::try_from(&fields).unwrap();
        assert_eq!(reading.gas, Some(12.5));
    }

    #[test]
    fn value_may_contain_colons_after_first_split() {
        let fields = parse_line("time: 12:30, bme_temp: 20.0");
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("bme_temp"));
    }

    #[test]
    fn empty_and_noise_lines_are_rejected() {
        assert_eq!(parse_reading(""), Err(ParseError::Empty));
        assert_eq!(parse_reading("Listening..."), Err(ParseError::Empty));
        assert_eq!(
            parse_reading("lux: 300"),
            Err(ParseError::Unrecognized("lux".to_string()))
        );
    }

    #[test]
    fn real_co2_rounds_to_integer() {
        let reading = parse_reading("scd_co2: 611.6").unwrap();
        assert_eq!(reading.co2, Some(612));
    }
}
