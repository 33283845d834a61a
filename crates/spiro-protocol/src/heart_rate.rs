//! Heart Rate Measurement notification frames.
//!
//! Wire layout (Bluetooth Heart Rate Profile, as emitted by the strap):
//!
//! ```text
//! byte 0      flags (bit 4: RR intervals present)
//! byte 1      heart rate, beats per minute
//! bytes 2..   zero or more little-endian u16 RR intervals, milliseconds
//! ```
//!
//! A frame shorter than two bytes carries nothing decodable and produces no
//! frame at all. When the RR flag is unset, or the buffer is too short to
//! hold an interval, the RR sequence is explicitly absent (`None`) rather
//! than empty: downstream consumers distinguish "this notification carried
//! no RR data" from "it carried an empty list".

use spiro_core::constants::RR_INTERVAL_FLAG;

/// One decoded heart-rate notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRateFrame {
    /// Flags byte as received.
    pub flags: u8,

    /// Heart rate in beats per minute.
    pub bpm: u8,

    /// Inter-beat intervals in milliseconds, `None` when the notification
    /// carried no RR data.
    pub rr_intervals: Option<Vec<u16>>,
}

impl HeartRateFrame {
    /// Decode a notification buffer.
    ///
    /// Returns `None` for buffers of length 1 or less; such notifications
    /// are dropped silently by the drivers, producing no event and no fault.
    ///
    /// # Examples
    ///
    /// ```
    /// use spiro_protocol::HeartRateFrame;
    ///
    /// let frame = HeartRateFrame::decode(&[0x10, 72, 0x20, 0x03]).unwrap();
    /// assert_eq!(frame.bpm, 72);
    /// assert_eq!(frame.rr_intervals, Some(vec![0x0320]));
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() <= 1 {
            return None;
        }

        let flags = buf[0];
        let bpm = buf[1];

        let rr_intervals = if flags & RR_INTERVAL_FLAG != 0 && buf.len() >= 4 {
            let mut intervals = Vec::with_capacity((buf.len() - 2) / 2);
            let mut i = 2;
            // A trailing odd byte is dropped rather than faulted on.
            while i + 1 < buf.len() {
                intervals.push(u16::from_le_bytes([buf[i], buf[i + 1]]));
                i += 2;
            }
            Some(intervals)
        } else {
            None
        };

        Some(Self {
            flags,
            bpm,
            rr_intervals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_decode_single_rr_interval() {
        let frame = HeartRateFrame::decode(&[0x10, 72, 0x20, 0x03]).unwrap();
        assert_eq!(frame.bpm, 72);
        // Little-endian combination of the trailing pair.
        assert_eq!(frame.rr_intervals, Some(vec![800]));
    }

    #[test]
    fn test_decode_multiple_rr_intervals() {
        let frame = HeartRateFrame::decode(&[0x10, 65, 0x20, 0x03, 0x40, 0x03]).unwrap();
        assert_eq!(frame.rr_intervals, Some(vec![800, 832]));
    }

    #[test]
    fn test_trailing_odd_byte_dropped() {
        let frame = HeartRateFrame::decode(&[0x10, 65, 0x20, 0x03, 0x99]).unwrap();
        assert_eq!(frame.rr_intervals, Some(vec![800]));
    }

    #[test]
    fn test_flag_unset_means_absent_not_empty() {
        let frame = HeartRateFrame::decode(&[0x00, 72, 0x20, 0x03]).unwrap();
        assert_eq!(frame.bpm, 72);
        assert_eq!(frame.rr_intervals, None);
    }

    #[test]
    fn test_flag_set_but_buffer_too_short() {
        // Flag claims RR data but there is no room for a single interval.
        let frame = HeartRateFrame::decode(&[0x10, 72, 0x20]).unwrap();
        assert_eq!(frame.rr_intervals, None);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x10])]
    fn test_short_buffers_produce_no_frame(#[case] buf: &[u8]) {
        assert_eq!(HeartRateFrame::decode(buf), None);
    }

    #[test]
    fn test_other_flag_bits_ignored() {
        // Energy-expended and contact bits must not affect RR decoding.
        let frame = HeartRateFrame::decode(&[0x06, 58]).unwrap();
        assert_eq!(frame.bpm, 58);
        assert_eq!(frame.rr_intervals, None);
    }
}
