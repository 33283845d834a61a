//! Inbound text response grammars for the wired instruments.
//!
//! The CO2 probe answers a read request with a `KEY=  VALUE UNIT` line, e.g.
//! `CO2=  412.35 ppm`. The flow meter answers with a whitespace-delimited
//! field line whose fourth field is the flow value in SCFM; that layout was
//! inferred from a live capture and is treated as provisional, which is why
//! it is isolated here behind its own function.

use spiro_core::{Result, SensorError};

/// Parse a CO2 probe response line into a concentration in ppm.
///
/// The line is split on `=`; at least two segments are required. The value
/// segment is trimmed and its first whitespace-delimited token parsed as a
/// float, so trailing units are ignored.
///
/// # Errors
///
/// Returns [`SensorError::Protocol`] when the `=` separator is missing, the
/// value segment is blank, or the value token is not numeric.
///
/// # Examples
///
/// ```
/// use spiro_protocol::parse_co2;
///
/// let ppm = parse_co2("CO2=  412.35 ppm").unwrap();
/// assert_eq!(ppm, 412.35);
/// ```
pub fn parse_co2(line: &str) -> Result<f64> {
    let mut parts = line.splitn(2, '=');
    let _key = parts.next();
    let value_segment = parts
        .next()
        .ok_or_else(|| SensorError::protocol(format!("missing '=' separator in {line:?}")))?;

    let token = value_segment
        .trim()
        .split_whitespace()
        .next()
        .ok_or_else(|| SensorError::protocol(format!("empty value segment in {line:?}")))?;

    token
        .parse::<f64>()
        .map_err(|_| SensorError::protocol(format!("non-numeric CO2 value {token:?}")))
}

/// Parse a flow meter response line into a flow rate in SCFM.
///
/// The whole line is split on whitespace; at least four fields are required
/// and the fourth is parsed as a float.
///
/// # Errors
///
/// Returns [`SensorError::Protocol`] when fewer than four fields are present
/// or the fourth is not numeric.
pub fn parse_flow_rate(line: &str) -> Result<f64> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(SensorError::protocol(format!(
            "expected at least 4 fields, got {} in {line:?}",
            fields.len()
        )));
    }

    fields[3]
        .parse::<f64>()
        .map_err(|_| SensorError::protocol(format!("non-numeric flow value {:?}", fields[3])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CO2=  412.35 ppm", 412.35)]
    #[case("CO2= 400.00 ppm", 400.0)]
    #[case("CO2=1024.5", 1024.5)]
    // Only the first token after '=' is taken.
    #[case("CO2=   987.6 ppm 25.0 C", 987.6)]
    // The line arrives with its terminator still attached downstream of a
    // raw read; trailing whitespace must not matter.
    #[case("CO2=  412.35 ppm\r\n", 412.35)]
    fn test_parse_co2_accepts(#[case] line: &str, #[case] expected: f64) {
        assert_eq!(parse_co2(line).unwrap(), expected);
    }

    #[rstest]
    #[case("412.35 ppm")] // no '=' separator
    #[case("CO2=")] // empty value segment
    #[case("CO2=   ")] // blank value segment
    #[case("CO2= high ppm")] // non-numeric token
    fn test_parse_co2_rejects(#[case] line: &str) {
        let err = parse_co2(line).unwrap_err();
        assert!(matches!(err, SensorError::Protocol { .. }), "{err}");
    }

    #[rstest]
    #[case("01 25.0 0.0 14.20 SCFM", 14.2)]
    #[case("a b c 3.75", 3.75)]
    // Extra fields beyond the fourth are ignored.
    #[case("1 2 3 99.9 5 6 7", 99.9)]
    fn test_parse_flow_rate_accepts(#[case] line: &str, #[case] expected: f64) {
        assert_eq!(parse_flow_rate(line).unwrap(), expected);
    }

    #[rstest]
    #[case("")] // empty line
    #[case("1 2 3")] // too few fields
    #[case("a b c nope")] // non-numeric fourth field
    fn test_parse_flow_rate_rejects(#[case] line: &str) {
        let err = parse_flow_rate(line).unwrap_err();
        assert!(matches!(err, SensorError::Protocol { .. }), "{err}");
    }
}
