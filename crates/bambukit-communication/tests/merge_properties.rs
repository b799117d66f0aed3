use bambukit_communication::firmware::bambu::{Device, Fragment};
use bambukit_core::DeviceType;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// One generated fragment: every field is optional
#[derive(Debug, Clone)]
struct Partial {
    bed_temper: Option<f64>,
    nozzle_temper: Option<f64>,
    mc_percent: Option<u8>,
    gcode_state: Option<&'static str>,
    spd_lvl: Option<u8>,
    cooling_fan_speed: Option<u8>,
    layer_num: Option<u32>,
    ams_identity: Option<u8>,
}

impl Partial {
    fn to_fragment(&self) -> Fragment {
        let mut map = Map::new();
        if let Some(v) = self.bed_temper {
            map.insert("bed_temper".into(), Value::from(v));
        }
        if let Some(v) = self.nozzle_temper {
            // Some firmware sends temperatures as strings
            map.insert("nozzle_temper".into(), Value::from(format!("{:.1}", v)));
        }
        if let Some(v) = self.mc_percent {
            map.insert("mc_percent".into(), Value::from(v));
        }
        if let Some(v) = self.gcode_state {
            map.insert("gcode_state".into(), Value::from(v));
        }
        if let Some(v) = self.spd_lvl {
            map.insert("spd_lvl".into(), Value::from(v));
        }
        if let Some(v) = self.cooling_fan_speed {
            map.insert("cooling_fan_speed".into(), Value::from(v.to_string()));
        }
        if let Some(v) = self.layer_num {
            map.insert("layer_num".into(), Value::from(v));
        }
        if let Some(index) = self.ams_identity {
            map.insert(
                "module".into(),
                serde_json::json!([{"name": format!("ams/{}", index), "sn": format!("SN{}", index)}]),
            );
        }
        Fragment::from_value(Value::Object(map)).unwrap()
    }
}

fn partial() -> impl Strategy<Value = Partial> {
    (
        proptest::option::of(0.0f64..120.0),
        proptest::option::of(0.0f64..300.0),
        proptest::option::of(0u8..=100),
        proptest::option::of(prop_oneof![
            Just("IDLE"),
            Just("PREPARE"),
            Just("RUNNING"),
            Just("PAUSE"),
            Just("FINISH"),
        ]),
        proptest::option::of(1u8..=4),
        proptest::option::of(0u8..=15),
        proptest::option::of(0u32..500),
        proptest::option::of(0u8..4),
    )
        .prop_map(
            |(
                bed_temper,
                nozzle_temper,
                mc_percent,
                gcode_state,
                spd_lvl,
                cooling_fan_speed,
                layer_num,
                ams_identity,
            )| Partial {
                bed_temper,
                nozzle_temper,
                mc_percent,
                gcode_state,
                spd_lvl,
                cooling_fan_speed,
                layer_num,
                ams_identity,
            },
        )
}

fn apply_all(device: &mut Device, partials: &[Partial]) -> Vec<u8> {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut discovered = Vec::new();
    for partial in partials {
        discovered.extend(device.update_at(&partial.to_fragment(), now).discovered_ams);
    }
    discovered
}

proptest! {
    #[test]
    fn prop_split_application_matches_whole(
        partials in proptest::collection::vec(partial(), 0..20),
        split in 0usize..20,
    ) {
        let split = split.min(partials.len());

        let mut whole = Device::new(DeviceType::X1C, "s");
        apply_all(&mut whole, &partials);

        let mut halves = Device::new(DeviceType::X1C, "s");
        apply_all(&mut halves, &partials[..split]);
        apply_all(&mut halves, &partials[split..]);

        prop_assert_eq!(whole.snapshot(), halves.snapshot());
    }

    #[test]
    fn prop_last_present_value_wins(partials in proptest::collection::vec(partial(), 1..20)) {
        let mut device = Device::new(DeviceType::X1C, "s");
        apply_all(&mut device, &partials);

        let last_bed = partials.iter().rev().find_map(|p| p.bed_temper);
        let last_percent = partials.iter().rev().find_map(|p| p.mc_percent);
        let last_level = partials.iter().rev().find_map(|p| p.spd_lvl);
        let last_fan = partials.iter().rev().find_map(|p| p.cooling_fan_speed);

        prop_assert_eq!(device.temperature().bed_temp(), last_bed.map_or(0, |v| v.round() as i32));
        prop_assert_eq!(device.info().print_percentage(), last_percent.unwrap_or(0));
        prop_assert_eq!(device.speed().level(), last_level.unwrap_or(2));
        prop_assert_eq!(device.fans().part_cooling().step(), u32::from(last_fan.unwrap_or(0)));
    }

    #[test]
    fn prop_fragment_without_field_never_regresses(
        partials in proptest::collection::vec(partial(), 1..20),
        gap in partial(),
    ) {
        let mut device = Device::new(DeviceType::X1C, "s");
        apply_all(&mut device, &partials);
        let before = device.snapshot();

        let gap = Partial { bed_temper: None, gcode_state: None, layer_num: None, ..gap };
        apply_all(&mut device, &[gap]);
        let after = device.snapshot();

        prop_assert_eq!(before.temperature.bed, after.temperature.bed);
        prop_assert_eq!(before.info.gcode_state, after.info.gcode_state);
        prop_assert_eq!(before.info.current_layer, after.info.current_layer);
    }

    #[test]
    fn prop_replay_is_idempotent(partials in proptest::collection::vec(partial(), 0..20)) {
        let mut once = Device::new(DeviceType::X1C, "s");
        let discovered_once = apply_all(&mut once, &partials);

        let doubled: Vec<Partial> = partials
            .iter()
            .flat_map(|p| [p.clone(), p.clone()])
            .collect();
        let mut twice = Device::new(DeviceType::X1C, "s");
        let discovered_twice = apply_all(&mut twice, &doubled);

        prop_assert_eq!(once.snapshot(), twice.snapshot());
        prop_assert_eq!(discovered_once, discovered_twice);
    }

    #[test]
    fn prop_each_unit_discovered_once(partials in proptest::collection::vec(partial(), 0..30)) {
        let mut device = Device::new(DeviceType::X1C, "s");
        let discovered = apply_all(&mut device, &partials);

        let mut unique = discovered.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), discovered.len());
        prop_assert_eq!(discovered.len(), device.ams().len());
    }
}
