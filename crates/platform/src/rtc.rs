//! Real-time clock driver
//!
//! Only what the wake-up path needs: 24 h mode, time set through the
//! `UPDTIM`/`ACKUPD` handshake, time and date alarms, interrupt masks.
//! Time registers hold BCD; a value the RTC refuses is flagged in `RTC_VER`
//! and surfaces as [`RtcError`].

use crate::bus::{self, PollTimeout, RegisterBus, DEFAULT_POLL_BUDGET};

/// RTC base address
pub const RTC_BASE: u32 = 0xF804_80B0;

/// Control Register
pub const RTC_CR: u32 = RTC_BASE;
/// Mode Register
pub const RTC_MR: u32 = RTC_BASE + 0x04;
/// Time Register
pub const RTC_TIMR: u32 = RTC_BASE + 0x08;
/// Calendar Register
pub const RTC_CALR: u32 = RTC_BASE + 0x0C;
/// Time Alarm Register
pub const RTC_TIMALR: u32 = RTC_BASE + 0x10;
/// Calendar Alarm Register
pub const RTC_CALALR: u32 = RTC_BASE + 0x14;
/// Status Register
pub const RTC_SR: u32 = RTC_BASE + 0x18;
/// Status Clear Command Register
pub const RTC_SCCR: u32 = RTC_BASE + 0x1C;
/// Interrupt Enable Register
pub const RTC_IER: u32 = RTC_BASE + 0x20;
/// Interrupt Disable Register
pub const RTC_IDR: u32 = RTC_BASE + 0x24;
/// Valid Entry Register
pub const RTC_VER: u32 = RTC_BASE + 0x2C;

/// `RTC_CR.UPDTIM`: request a time update
pub const CR_UPDTIM: u32 = 1 << 0;
/// `RTC_MR.HRMOD`: 12 h mode when set
pub const MR_HRMOD: u32 = 1 << 0;

/// Update acknowledge (SR / SCCR)
pub const SR_ACKUPD: u32 = 1 << 0;
/// Alarm flag (SR / SCCR / IER / IDR)
pub const SR_ALARM: u32 = 1 << 1;
/// Second event (SR / SCCR / IER / IDR)
pub const SR_SEC: u32 = 1 << 2;

const TIMALR_SECEN: u32 = 1 << 7;
const TIMALR_MINEN: u32 = 1 << 15;
const TIMALR_HOUREN: u32 = 1 << 23;
const CALALR_MTHEN: u32 = 1 << 23;
const CALALR_DATEEN: u32 = 1 << 31;

const VER_NVTIM: u32 = 1 << 0;
const VER_NVTIMALR: u32 = 1 << 2;
const VER_NVCALALR: u32 = 1 << 3;

/// Seconds in a day
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Hour display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HourMode {
    /// 24-hour mode
    H24,
    /// 12-hour mode with AM/PM
    H12,
}

/// Time of day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Time {
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub min: u8,
    /// 0-59
    pub sec: u8,
}

impl Time {
    /// Midnight. Also the "no alarm" value for [`Rtc::set_time_alarm`].
    pub const MIDNIGHT: Self = Self { hour: 0, min: 0, sec: 0 };

    /// Split a second count within one day.
    // Each quotient is below 60 (or 24), so the narrowing is lossless.
    #[allow(clippy::cast_possible_truncation, clippy::arithmetic_side_effects)]
    pub fn from_seconds(seconds: u32) -> Result<Self, RtcError> {
        if seconds >= SECONDS_PER_DAY {
            return Err(RtcError::OutOfRange);
        }
        Ok(Self {
            hour: (seconds / 3600) as u8,
            min: ((seconds / 60) % 60) as u8,
            sec: (seconds % 60) as u8,
        })
    }

    fn check(&self) -> Result<(), RtcError> {
        if self.hour < 24 && self.min < 60 && self.sec < 60 {
            Ok(())
        } else {
            Err(RtcError::OutOfRange)
        }
    }
}

/// Calendar alarm fields. Zero fields are not compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateAlarm {
    /// 1-12, or 0 for "any month"
    pub month: u8,
    /// 1-31, or 0 for "any day"
    pub day: u8,
}

/// RTC failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError {
    /// A field is outside its range.
    #[error("time field out of range")]
    OutOfRange,
    /// `RTC_VER.NVTIM`: the time written was rejected.
    #[error("RTC rejected the time value")]
    InvalidTime,
    /// `RTC_VER.NVTIMALR`: the time alarm written was rejected.
    #[error("RTC rejected the time alarm")]
    InvalidTimeAlarm,
    /// `RTC_VER.NVCALALR`: the date alarm written was rejected.
    #[error("RTC rejected the date alarm")]
    InvalidDateAlarm,
    /// `ACKUPD` never set.
    #[error("RTC update handshake timed out")]
    Timeout(#[from] PollTimeout),
}

/// Two-digit binary to BCD.
#[allow(clippy::arithmetic_side_effects)]
pub const fn to_bcd(value: u8) -> u32 {
    (((value / 10) as u32) << 4) | (value % 10) as u32
}

/// BCD to binary. Only the low byte is used.
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
pub const fn from_bcd(bcd: u32) -> u8 {
    (((bcd >> 4) & 0xF) * 10 + (bcd & 0xF)) as u8
}

/// RTC driver.
pub struct Rtc<B> {
    bus: B,
    budget: u32,
}

// Field shifts are constant and in range.
#[allow(clippy::arithmetic_side_effects)]
impl<B: RegisterBus> Rtc<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus, budget: DEFAULT_POLL_BUDGET }
    }

    /// Override the number of status reads per poll.
    #[must_use]
    pub fn with_poll_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Enable the interrupts in `mask` (`SR_ALARM`, `SR_SEC`).
    pub fn enable_interrupts(&mut self, mask: u32) {
        self.bus.write(RTC_IER, mask);
    }

    /// Disable the interrupts in `mask`.
    pub fn disable_interrupts(&mut self, mask: u32) {
        self.bus.write(RTC_IDR, mask);
    }

    /// Raw status.
    pub fn status(&self) -> u32 {
        self.bus.read(RTC_SR)
    }

    /// Clear the status flags in `mask`.
    pub fn clear_status(&mut self, mask: u32) {
        self.bus.write(RTC_SCCR, mask);
    }

    /// Select 12 h or 24 h mode.
    pub fn set_hour_mode(&mut self, mode: HourMode) {
        match mode {
            HourMode::H24 => self.bus.clear_bits(RTC_MR, MR_HRMOD),
            HourMode::H12 => self.bus.set_bits(RTC_MR, MR_HRMOD),
        }
    }

    /// Set the time of day (24 h mode).
    pub fn set_time(&mut self, time: &Time) -> Result<(), RtcError> {
        time.check()?;
        let timr = to_bcd(time.sec) | (to_bcd(time.min) << 8) | (to_bcd(time.hour) << 16);

        self.bus.set_bits(RTC_CR, CR_UPDTIM);
        bus::wait_for_bits(&self.bus, RTC_SR, SR_ACKUPD, self.budget)?;
        self.bus.write(RTC_SCCR, SR_ACKUPD);
        self.bus.write(RTC_TIMR, timr);
        self.bus.clear_bits(RTC_CR, CR_UPDTIM);

        if self.bus.read(RTC_VER) & VER_NVTIM != 0 {
            return Err(RtcError::InvalidTime);
        }
        Ok(())
    }

    /// Read back the time of day.
    pub fn time(&self) -> Time {
        let timr = self.bus.read(RTC_TIMR);
        Time {
            hour: from_bcd((timr >> 16) & 0x3F),
            min: from_bcd((timr >> 8) & 0x7F),
            sec: from_bcd(timr & 0x7F),
        }
    }

    /// Program the time alarm. Only non-zero fields are compared, so
    /// [`Time::MIDNIGHT`] disables the alarm.
    pub fn set_time_alarm(&mut self, alarm: &Time) -> Result<(), RtcError> {
        alarm.check()?;
        let mut value = 0;
        if alarm.hour != 0 {
            value |= TIMALR_HOUREN | (to_bcd(alarm.hour) << 16);
        }
        if alarm.min != 0 {
            value |= TIMALR_MINEN | (to_bcd(alarm.min) << 8);
        }
        if alarm.sec != 0 {
            value |= TIMALR_SECEN | to_bcd(alarm.sec);
        }
        self.bus.write(RTC_TIMALR, value);

        if self.bus.read(RTC_VER) & VER_NVTIMALR != 0 {
            return Err(RtcError::InvalidTimeAlarm);
        }
        Ok(())
    }

    /// Program the calendar alarm. A zeroed [`DateAlarm`] disables it.
    pub fn set_date_alarm(&mut self, alarm: &DateAlarm) -> Result<(), RtcError> {
        if alarm.month > 12 || alarm.day > 31 {
            return Err(RtcError::OutOfRange);
        }
        let mut value = 0;
        if alarm.month != 0 {
            value |= CALALR_MTHEN | (to_bcd(alarm.month) << 16);
        }
        if alarm.day != 0 {
            value |= CALALR_DATEEN | (to_bcd(alarm.day) << 24);
        }
        self.bus.write(RTC_CALALR, value);

        if self.bus.read(RTC_VER) & VER_NVCALALR != 0 {
            return Err(RtcError::InvalidDateAlarm);
        }
        Ok(())
    }

    /// Arm the alarm `seconds` from now.
    ///
    /// Interrupts off, 24 h mode, both alarms cleared, clock reset to
    /// 00:00:00, alarm interrupt on, then the time alarm at `seconds`.
    pub fn configure_wakeup_alarm(&mut self, seconds: u32) -> Result<(), RtcError> {
        let alarm = Time::from_seconds(seconds)?;

        self.disable_interrupts(SR_SEC | SR_ALARM);
        self.set_hour_mode(HourMode::H24);
        self.set_time_alarm(&Time::MIDNIGHT)?;
        self.set_date_alarm(&DateAlarm::default())?;
        self.set_time(&Time::MIDNIGHT)?;
        self.clear_status(SR_ALARM | SR_SEC);
        self.enable_interrupts(SR_ALARM);
        self.set_time_alarm(&alarm)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("RTC alarm armed for +{=u32} s", seconds);
        Ok(())
    }

    /// Acknowledge a fired alarm and mask its interrupt.
    pub fn acknowledge_alarm(&mut self) -> bool {
        let fired = self.status() & SR_ALARM != 0;
        if fired {
            self.disable_interrupts(SR_ALARM);
            self.clear_status(SR_ALARM);
        }
        fired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn test_bcd() {
        assert_eq!(to_bcd(0), 0x00);
        assert_eq!(to_bcd(30), 0x30);
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(from_bcd(0x23), 23);
    }

    #[test]
    fn test_from_seconds() {
        assert_eq!(Time::from_seconds(30), Ok(Time { hour: 0, min: 0, sec: 30 }));
        assert_eq!(Time::from_seconds(3725), Ok(Time { hour: 1, min: 2, sec: 5 }));
        assert_eq!(Time::from_seconds(SECONDS_PER_DAY), Err(RtcError::OutOfRange));
    }

    #[test]
    fn test_set_time_handshake_order() {
        let mut bus = MockBus::new();
        bus.preset(RTC_SR, SR_ACKUPD);
        let t = Time { hour: 12, min: 34, sec: 56 };
        assert_eq!(Rtc::new(&mut bus).set_time(&t), Ok(()));

        let cr_set = bus.first_write(RTC_CR).unwrap();
        let ack = bus.first_write(RTC_SCCR).unwrap();
        let timr = bus.first_write(RTC_TIMR).unwrap();
        let cr_clear = bus.last_write_index(RTC_CR).unwrap();
        assert!(cr_set < ack && ack < timr && timr < cr_clear);
        assert_eq!(bus.value(RTC_TIMR), 0x12_34_56);
        assert_eq!(bus.value(RTC_CR) & CR_UPDTIM, 0);
    }

    #[test]
    fn test_time_decodes_bcd() {
        let mut bus = MockBus::new();
        bus.preset(RTC_TIMR, 0x23_59_07);
        assert_eq!(Rtc::new(&mut bus).time(), Time { hour: 23, min: 59, sec: 7 });
    }

    #[test]
    fn test_set_time_without_ack_times_out() {
        let mut bus = MockBus::new();
        let err = Rtc::new(&mut bus)
            .with_poll_budget(4)
            .set_time(&Time::MIDNIGHT)
            .unwrap_err();
        assert!(matches!(err, RtcError::Timeout(_)));
    }

    #[test]
    fn test_rejected_time_is_reported() {
        let mut bus = MockBus::new();
        bus.preset(RTC_SR, SR_ACKUPD);
        bus.preset(RTC_VER, VER_NVTIM);
        assert_eq!(
            Rtc::new(&mut bus).set_time(&Time::MIDNIGHT),
            Err(RtcError::InvalidTime)
        );
    }

    #[test]
    fn test_alarm_enables_only_nonzero_fields() {
        let mut bus = MockBus::new();
        let mut rtc = Rtc::new(&mut bus);
        assert_eq!(rtc.set_time_alarm(&Time { hour: 0, min: 0, sec: 30 }), Ok(()));
        assert_eq!(bus.last_write(RTC_TIMALR), Some(TIMALR_SECEN | 0x30));

        let mut rtc = Rtc::new(&mut bus);
        assert_eq!(rtc.set_time_alarm(&Time::MIDNIGHT), Ok(()));
        assert_eq!(bus.last_write(RTC_TIMALR), Some(0));
    }

    #[test]
    fn test_configure_wakeup_alarm_sequence() {
        let mut bus = MockBus::new();
        bus.preset(RTC_SR, SR_ACKUPD);
        bus.preset(RTC_MR, MR_HRMOD);
        assert_eq!(Rtc::new(&mut bus).configure_wakeup_alarm(30), Ok(()));

        assert_eq!(bus.value(RTC_MR) & MR_HRMOD, 0);
        assert_eq!(bus.last_write(RTC_CALALR), Some(0));
        assert_eq!(bus.last_write(RTC_TIMALR), Some(TIMALR_SECEN | 0x30));
        let idr = bus.first_write(RTC_IDR).unwrap();
        let ier = bus.first_write(RTC_IER).unwrap();
        let timr = bus.first_write(RTC_TIMR).unwrap();
        assert!(idr < timr && timr < ier);
        assert_eq!(bus.last_write(RTC_IER), Some(SR_ALARM));
    }
}
