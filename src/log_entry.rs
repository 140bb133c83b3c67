//! Move log entries read from the watch.
//!
//! A [`LogEntry`] owns its header and an ordered list of [`LogSample`]s. Each
//! sample's [`LogSampleKind`] owns at most one heap payload, chosen by the
//! variant: periodic values, GPS satellites or unrecognised raw bytes. All
//! other variants are plain inline data. Dropping an entry releases
//! everything it owns; [`LogEntry::release`] does the same and reports how
//! many payload buffers went with it.

use chrono::NaiveDateTime;

/// Summary header of one move.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogHeader {
    pub date_time: Option<NaiveDateTime>,
    pub duration_ms: u32,
    pub ascent: u16,
    pub descent: u16,
    pub ascent_time_s: u32,
    pub descent_time_s: u32,
    pub recovery_time_s: u32,
    pub heartrate_avg: u8,
    pub heartrate_max: u8,
    pub heartrate_min: u8,
    pub distance_m: u32,
    pub speed_avg: u16,
    pub speed_max: u16,
    pub altitude_max: i16,
    pub altitude_min: i16,
    pub temperature_max: i16,
    pub temperature_min: i16,
    pub calories: u16,
    pub activity_type: u8,
    pub activity_name: String,
    pub samples_count: u32,
}

/// Periodic measurement channel. Values are kept in device units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PeriodicValue {
    Latitude(i32),
    Longitude(i32),
    Distance(u32),
    Speed(u16),
    Heartrate(u8),
    Time(u32),
    GpsSpeed(u16),
    WristAccSpeed(u16),
    BikePodSpeed(u16),
    Ehpe(u32),
    Evpe(u32),
    Altitude(i16),
    AbsPressure(u16),
    Energy(u16),
    Temperature(i16),
    Charge(u8),
    GpsAltitude(i32),
    GpsHeading(u16),
    GpsHdop(u8),
    GpsVdop(u8),
    WristCadence(u16),
    Snr([u8; 16]),
    NoOfSatellites(u8),
    SeaLevelPressure(i16),
    VerticalSpeed(i16),
    Cadence(u8),
    BikePower(u16),
    SwimingStrokeCnt(u32),
    RuleOutput(u8, i32),
}

/// One satellite in a GPS base sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Satellite {
    pub sv: u8,
    pub snr: u8,
    pub state: u8,
}

/// Sample payload, one variant per sample type.
#[derive(Clone, Debug, PartialEq)]
pub enum LogSampleKind {
    Periodic {
        values: Vec<PeriodicValue>,
    },
    LogPause,
    LogRestart,
    Ibi {
        ibi: [u16; 32],
        count: u8,
    },
    Ttff(u16),
    DistanceSource(u8),
    LapInfo {
        event_type: u8,
        date_time: Option<NaiveDateTime>,
        duration_ms: u32,
        distance_m: u32,
    },
    AltitudeSource {
        source_type: u8,
        altitude_offset: i16,
        pressure_offset: i16,
    },
    GpsBase {
        navtype: u16,
        latitude: i32,
        longitude: i32,
        altitude: i32,
        speed: u16,
        heading: u16,
        hdop: u8,
        satellites: Vec<Satellite>,
    },
    GpsSmall {
        latitude: i32,
        longitude: i32,
        ehpe: u32,
        noofsatellites: u8,
    },
    GpsTiny {
        latitude: i32,
        longitude: i32,
        ehpe: u32,
    },
    Time {
        hour: u8,
        minute: u8,
        second: u8,
    },
    Activity {
        activity_type: u16,
        custom_mode: u32,
    },
    CadenceSource(u8),
    Position {
        latitude: i32,
        longitude: i32,
    },
    FwInfo {
        version: [u8; 4],
        build_date: Option<NaiveDateTime>,
    },
    Unknown {
        data: Vec<u8>,
    },
}

/// One timestamped sample.
#[derive(Clone, Debug, PartialEq)]
pub struct LogSample {
    /// Milliseconds since the start of the move.
    pub time: u32,
    pub kind: LogSampleKind,
}

impl LogSample {
    pub fn new(time: u32, kind: LogSampleKind) -> Self {
        Self { time, kind }
    }

    /// Element count of the owned payload; `0` for inline variants.
    pub fn owned_payload_len(&self) -> usize {
        match &self.kind {
            LogSampleKind::Periodic { values } => values.len(),
            LogSampleKind::GpsBase { satellites, .. } => satellites.len(),
            LogSampleKind::Unknown { data } => data.len(),
            _ => 0,
        }
    }

    /// `true` for variants that own a heap payload.
    pub fn owns_payload(&self) -> bool {
        matches!(
            self.kind,
            LogSampleKind::Periodic { .. } | LogSampleKind::GpsBase { .. } | LogSampleKind::Unknown { .. }
        )
    }
}

/// One move: header plus samples in recording order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogEntry {
    pub header: LogHeader,
    pub samples: Vec<LogSample>,
}

impl LogEntry {
    pub fn new(header: LogHeader) -> Self {
        Self {
            header,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: LogSample) {
        self.samples.push(sample);
    }

    /// Release the entry: every sample payload first, then the sample list,
    /// then the entry. Returns the number of payload buffers released.
    pub fn release(self) -> usize {
        let LogEntry { header, samples } = self;
        let mut released = 0;
        for sample in samples {
            if sample.owns_payload() {
                released += 1;
            }
            drop(sample);
        }
        drop(header);
        released
    }
}

/// Release an entry if there is one. `None` releases nothing.
pub fn release_entry(entry: Option<LogEntry>) -> usize {
    entry.map_or(0, LogEntry::release)
}

/// Receiver for entries produced by a driver's log read.
///
/// Drivers ask [`LogSink::skip`] before downloading an entry's samples, so
/// callers can avoid re-reading moves they already have.
pub trait LogSink {
    /// Return `true` to skip the entry described by `header`.
    fn skip(&mut self, _header: &LogHeader) -> bool {
        false
    }

    /// Take ownership of one fully read entry.
    fn push(&mut self, entry: LogEntry);

    /// Progress report: entry `log_current` of `log_count`, `percent` overall.
    fn progress(&mut self, _log_count: u16, _log_current: u16, _percent: u8) {}
}

impl LogSink for Vec<LogEntry> {
    fn push(&mut self, entry: LogEntry) {
        Vec::push(self, entry);
    }
}
