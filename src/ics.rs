// src/ics.rs
// ICS serialization of the assembled event set. All-day events are emitted as
// VALUE=DATE (begin == end, matching the upstream calendars); timed events
// carry a TZID so the wall-clock time survives any client timezone.

use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use crate::event::Event;

pub fn serialize_calendar(events: &[Event]) -> String {
    let mut cal = Calendar::new();
    for event in events {
        cal.push(to_ics_event(event));
    }
    cal.done().to_string()
}

fn to_ics_event(event: &Event) -> icalendar::Event {
    let mut out = icalendar::Event::new();
    out.uid(&event.uid);
    out.summary(&event.title);

    let description = event.description();
    if !description.is_empty() {
        out.description(&description);
    }

    if event.day_kind.is_all_day() {
        let date = event.date().format("%Y%m%d").to_string();
        add_date(&mut out, "DTSTART", date.clone());
        add_date(&mut out, "DTEND", date);
    } else {
        let tzid = event.start.timezone().name();
        add_zoned(
            &mut out,
            "DTSTART",
            event.start.format("%Y%m%dT%H%M%S").to_string(),
            tzid,
        );
        add_zoned(
            &mut out,
            "DTEND",
            event.end().format("%Y%m%dT%H%M%S").to_string(),
            tzid,
        );
    }

    out.done()
}

fn add_date(event: &mut icalendar::Event, name: &str, value: String) {
    let mut prop = Property::new(name, value);
    prop.append_parameter(ValueType::Date);
    event.append_property(prop);
}

fn add_zoned(event: &mut icalendar::Event, name: &str, value: String, tzid: &str) {
    let mut prop = Property::new(name, value);
    prop.add_parameter("TZID", tzid);
    event.append_property(prop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DayKind;
    use chrono::TimeZone;
    use chrono_tz::Asia::Shanghai;

    fn timed(uid: &str) -> Event {
        Event {
            uid: uid.to_string(),
            title: "🇺🇸 2月零售销售环比".to_string(),
            start: Shanghai.with_ymd_and_hms(2025, 3, 17, 20, 30, 0).unwrap(),
            day_kind: DayKind::Timed,
            duration_minutes: 120,
            raw_description_parts: vec!["📊 事件详情: 零售".to_string()],
            enriched_description: None,
        }
    }

    #[test]
    fn timed_event_has_tzid_and_duration() {
        let ics = serialize_calendar(&[timed("a_wscn_macro")]);
        assert!(ics.contains("UID:a_wscn_macro"));
        assert!(ics.contains("DTSTART;TZID=Asia/Shanghai:20250317T203000"));
        assert!(ics.contains("DTEND;TZID=Asia/Shanghai:20250317T223000"));
    }

    #[test]
    fn all_day_event_uses_value_date() {
        let mut ev = timed("b");
        ev.day_kind = DayKind::AllDay;
        let ics = serialize_calendar(&[ev]);
        assert!(ics.contains("DTSTART;VALUE=DATE:20250317"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250317"));
        assert!(!ics.contains("TZID"));
    }

    #[test]
    fn description_prefers_enriched_text() {
        let mut ev = timed("c");
        ev.enriched_description = Some("🔍 投资分析".to_string());
        let ics = serialize_calendar(&[ev]);
        assert!(ics.contains("DESCRIPTION:🔍 投资分析"));
    }

    #[test]
    fn serialization_preserves_input_order() {
        let ics = serialize_calendar(&[timed("first"), timed("second")]);
        let a = ics.find("UID:first").unwrap();
        let b = ics.find("UID:second").unwrap();
        assert!(a < b);
    }
}
