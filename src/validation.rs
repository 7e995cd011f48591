use crate::error::{Error, Result};
use crate::types::{Clock, MAX_LICENSE_LEVEL, NewLogEntry, Pilot};

const MAX_NAME_LEN: usize = 100;
const MAX_CALLSIGN_LEN: usize = 40;

fn validate_name(name: &str, entity: &str, max_len: usize) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest(format!("{entity} name cannot be empty")));
    }
    if name.chars().count() > max_len {
        return Err(Error::BadRequest(format!(
            "{entity} name cannot exceed {max_len} characters"
        )));
    }
    Ok(())
}

pub fn validate_corporation_name(name: &str) -> Result<()> {
    validate_name(name, "Corporation", MAX_NAME_LEN)
}

pub fn validate_display_name(name: &str) -> Result<()> {
    validate_name(name, "Display", MAX_NAME_LEN)
}

pub fn validate_gear_name(name: &str) -> Result<()> {
    validate_name(name, "Gear", MAX_NAME_LEN)
}

pub fn validate_pilot(pilot: &Pilot) -> Result<()> {
    validate_name(&pilot.name, "Pilot", MAX_NAME_LEN)?;
    if let Some(callsign) = &pilot.callsign {
        validate_name(callsign, "Callsign", MAX_CALLSIGN_LEN)?;
    }
    if !(0..=MAX_LICENSE_LEVEL).contains(&pilot.license_level) {
        return Err(Error::BadRequest(format!(
            "license level must be between 0 and {MAX_LICENSE_LEVEL}"
        )));
    }
    if pilot.ll_clock_progress < 0 {
        return Err(Error::BadRequest(
            "license clock progress cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_clock(clock: &Clock) -> Result<()> {
    validate_name(&clock.name, "Clock", MAX_NAME_LEN)?;
    if clock.segments <= 0 {
        return Err(Error::BadRequest("segments must be positive".to_string()));
    }
    if clock.tick_amount <= 0 {
        return Err(Error::BadRequest("tick amount must be positive".to_string()));
    }
    if clock.filled < 0 || clock.filled > clock.segments {
        return Err(Error::BadRequest(format!(
            "filled must be between 0 and {}",
            clock.segments
        )));
    }
    Ok(())
}

pub fn validate_new_log_entry(entry: &NewLogEntry) -> Result<()> {
    for tick in &entry.clock_ticks {
        if tick.ticks <= 0 {
            return Err(Error::BadRequest(format!(
                "clock {} must advance by a positive number of ticks",
                tick.clock_id
            )));
        }
    }
    for gear in &entry.gear_acquired {
        validate_gear_name(&gear.name)?;
    }
    let mut lost = entry.gear_lost.clone();
    lost.sort();
    lost.dedup();
    if lost.len() != entry.gear_lost.len() {
        return Err(Error::BadRequest(
            "the same gear cannot be lost twice in one log".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{ClockTick, LogType};

    fn pilot() -> Pilot {
        let now = Utc::now();
        Pilot {
            id: "p-1".to_string(),
            user_id: "u-1".to_string(),
            name: "Ilse Haas".to_string(),
            callsign: Some("Lantern".to_string()),
            license_level: 2,
            ll_clock_progress: 1,
            background: None,
            notes: None,
            manna: 0,
            downtime: 0,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pilot_license_range() {
        let mut p = pilot();
        assert!(validate_pilot(&p).is_ok());
        p.license_level = 13;
        assert!(matches!(validate_pilot(&p), Err(Error::BadRequest(_))));
        p.license_level = -1;
        assert!(validate_pilot(&p).is_err());
        p.license_level = 12;
        assert!(validate_pilot(&p).is_ok());
    }

    #[test]
    fn test_pilot_name_required() {
        let mut p = pilot();
        p.name = "   ".to_string();
        assert!(validate_pilot(&p).is_err());
    }

    #[test]
    fn test_clock_filled_bounded_by_segments() {
        let now = Utc::now();
        let mut clock = Clock {
            id: "c-1".to_string(),
            pilot_id: None,
            name: "Union audit".to_string(),
            description: None,
            segments: 4,
            filled: 4,
            tick_amount: 1,
            completed: true,
            created_at: now,
            updated_at: now,
        };
        assert!(validate_clock(&clock).is_ok());
        clock.filled = 5;
        assert!(validate_clock(&clock).is_err());
        clock.filled = 0;
        clock.segments = 0;
        assert!(validate_clock(&clock).is_err());
    }

    #[test]
    fn test_log_ticks_positive_and_gear_unique() {
        let mut entry = NewLogEntry::new("p-1", LogType::Game);
        entry.clock_ticks.push(ClockTick {
            clock_id: "c-1".to_string(),
            ticks: 0,
        });
        assert!(validate_new_log_entry(&entry).is_err());

        entry.clock_ticks[0].ticks = 2;
        entry.gear_lost = vec!["g-1".to_string(), "g-1".to_string()];
        assert!(validate_new_log_entry(&entry).is_err());

        entry.gear_lost.pop();
        assert!(validate_new_log_entry(&entry).is_ok());
    }
}
