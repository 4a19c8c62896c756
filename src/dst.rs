//! Central European daylight-saving offsets
//!
//! Clock changes happen on the last Sunday of March (to CEST, UTC+2) and
//! October (back to CET, UTC+1).

/// Offset used before the first listed transition (CET)
pub const DEFAULT_UTC_OFFSET: i8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstTransition {
    /// UTC unix seconds at which `offset_hours` takes effect
    pub timestamp: i64,
    pub offset_hours: i8,
}

const fn transition(timestamp: i64, offset_hours: i8) -> DstTransition {
    DstTransition {
        timestamp,
        offset_hours,
    }
}

pub const DST_TRANSITIONS: [DstTransition; 16] = [
    transition(1679792400, 2), // 26.03.2023
    transition(1698541200, 1), // 29.10.2023
    transition(1711846800, 2), // 31.03.2024
    transition(1729990800, 1), // 27.10.2024
    transition(1743296400, 2), // 30.03.2025
    transition(1761440400, 1), // 26.10.2025
    transition(1774746000, 2), // 29.03.2026
    transition(1792890000, 1), // 25.10.2026
    // Entries from 2027 on hold the local change time read as UTC
    transition(1806199200, 2), // 28.03.2027
    transition(1824951600, 1), // 31.10.2027
    transition(1837648800, 2), // 26.03.2028
    transition(1856401200, 1), // 29.10.2028
    transition(1869098400, 2), // 25.03.2029
    transition(1887850800, 1), // 28.10.2029
    transition(1901152800, 2), // 31.03.2030
    transition(1919300400, 1), // 27.10.2030
];

/// UTC offset in hours in effect at `unix` (UTC seconds)
pub fn resolve_offset(unix: i64) -> i8 {
    match DST_TRANSITIONS.partition_point(|t| t.timestamp <= unix) {
        0 => DEFAULT_UTC_OFFSET,
        n => DST_TRANSITIONS[n - 1].offset_hours,
    }
}

pub fn utc_to_local(unix: i64) -> i64 {
    unix + i64::from(resolve_offset(unix)) * 3600
}

/// Convert local wall-clock seconds back to UTC
///
/// The lookup runs at the winter-time reading of `local`. In the repeated
/// hour of an autumn change this picks the second (CET) occurrence.
pub fn local_to_utc(local: i64) -> i64 {
    let offset = resolve_offset(local - i64::from(DEFAULT_UTC_OFFSET) * 3600);
    local - i64::from(offset) * 3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ordered_and_alternating() {
        for pair in DST_TRANSITIONS.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert_ne!(pair[0].offset_hours, pair[1].offset_hours);
        }
    }

    #[test]
    fn test_spring_transition_boundary() {
        assert_eq!(resolve_offset(1679792399), 1);
        assert_eq!(resolve_offset(1679792400), 2);
    }

    #[test]
    fn test_autumn_transition_boundary() {
        assert_eq!(resolve_offset(1698541199), 2);
        assert_eq!(resolve_offset(1698541200), 1);
    }

    #[test]
    fn test_before_and_after_table() {
        assert_eq!(resolve_offset(0), DEFAULT_UTC_OFFSET);
        assert_eq!(resolve_offset(1_600_000_000), DEFAULT_UTC_OFFSET);
        assert_eq!(resolve_offset(2_000_000_000), 1);
    }

    #[test]
    fn test_utc_to_local() {
        // 01.07.2024 12:00 UTC is 14:00 CEST
        assert_eq!(utc_to_local(1719835200), 1719835200 + 7200);
        // 01.01.2025 12:00 UTC is 13:00 CET
        assert_eq!(utc_to_local(1735732800), 1735732800 + 3600);
    }

    #[test]
    fn test_local_to_utc_round_trips_outside_changes() {
        for utc in [1719835200, 1735732800, 1679792400 + 1800, 1698541200 + 7200] {
            assert_eq!(local_to_utc(utc_to_local(utc)), utc);
        }
    }

    #[test]
    fn test_local_to_utc_in_repeated_hour() {
        // 02:30 local on 29.10.2023 exists twice; the CET reading wins
        let local = 1698541200 + 1800 + 3600;
        assert_eq!(local_to_utc(local), 1698541200 + 1800);
    }
}
