use bambukit_communication::firmware::bambu::{BambuController, Device, FsJobCache};
use bambukit_communication::{ChannelTransport, Feature, OutboundMessage, PrinterCommand};
use bambukit_core::{
    AppEvent, CommandEvent, DeviceEvent, DeviceType, Error, EventCategory, EventFilter,
    GcodeState, LightMode,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const SERIAL: &str = "01S00A000000001";

type Outbound = mpsc::UnboundedReceiver<OutboundMessage>;

fn controller(device_type: DeviceType) -> (BambuController, Outbound, TempDir) {
    let dir = TempDir::new().unwrap();
    let (transport, outbound) = ChannelTransport::new();
    let controller = BambuController::new(
        Device::new(device_type, SERIAL),
        Arc::new(transport),
        Arc::new(FsJobCache::new(dir.path())),
    );
    (controller, outbound, dir)
}

fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

async fn wait_until_stopped(controller: &BambuController) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ingestion task did not finish");
}

#[tokio::test]
async fn test_start_requests_version_and_full_status() {
    let (controller, mut outbound, _dir) = controller(DeviceType::X1C);
    let (_reports_tx, reports_rx) = mpsc::channel(16);

    controller.start(reports_rx).unwrap();
    assert!(controller.is_running());

    let first = outbound.recv().await.unwrap();
    let second = outbound.recv().await.unwrap();
    assert_eq!(first.topic, format!("device/{}/request", SERIAL));
    assert_eq!(first.document().unwrap()["info"]["command"], "get_version");
    assert_eq!(second.document().unwrap()["pushing"]["command"], "pushall");

    controller.stop();
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_reports_applied_in_order() {
    let (controller, _outbound, _dir) = controller(DeviceType::X1C);
    let (reports_tx, reports_rx) = mpsc::channel(16);
    controller.start(reports_rx).unwrap();

    reports_tx
        .send(payload(json!({"print": {"gcode_state": "PREPARE", "mc_percent": 0}})))
        .await
        .unwrap();
    reports_tx
        .send(payload(json!({"print": {"gcode_state": "RUNNING", "mc_percent": 12}})))
        .await
        .unwrap();
    reports_tx
        .send(payload(json!({"print": {"nozzle_temper": 220.4}})))
        .await
        .unwrap();
    drop(reports_tx);
    wait_until_stopped(&controller).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.info.gcode_state, "RUNNING");
    assert_eq!(snapshot.info.print_percentage, 12);
    assert_eq!(snapshot.temperature.nozzle, 220);
}

#[tokio::test]
async fn test_bad_payload_does_not_stop_ingestion() {
    let (controller, _outbound, _dir) = controller(DeviceType::X1C);
    let rejected = Arc::new(AtomicUsize::new(0));
    let counter = rejected.clone();
    controller.events().subscribe(
        EventFilter::Categories(vec![EventCategory::Device]),
        move |event| {
            if let AppEvent::Device(DeviceEvent::ReportRejected { .. }) = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    let (reports_tx, reports_rx) = mpsc::channel(16);
    controller.start(reports_rx).unwrap();
    reports_tx.send(b"{not json".to_vec()).await.unwrap();
    reports_tx.send(b"[]".to_vec()).await.unwrap();
    reports_tx
        .send(payload(json!({"print": {"gcode_state": "IDLE"}})))
        .await
        .unwrap();
    drop(reports_tx);
    wait_until_stopped(&controller).await;

    assert_eq!(rejected.load(Ordering::SeqCst), 2);
    assert_eq!(controller.gcode_state(), GcodeState::Idle);
}

#[test]
fn test_registry_listener_fires_once_per_unit() {
    let (controller, _outbound, _dir) = controller(DeviceType::X1C);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    controller.on_registry_changed(move |index| sink.lock().push(index));

    let identity = payload(json!({
        "info": {
            "command": "get_version",
            "module": [
                {"name": "ams/0", "sn": "A", "hw_ver": "AMS08", "sw_ver": "00.00.05.96"},
                {"name": "ams/1", "sn": "B", "hw_ver": "AMS08", "sw_ver": "00.00.05.96"}
            ]
        }
    }));
    controller.handle_payload(&identity).unwrap();
    controller.handle_payload(&identity).unwrap();
    controller
        .handle_payload(&payload(json!({
            "print": {"ams": {"ams": [{"id": "0", "humidity": "3"}]}}
        })))
        .unwrap();

    assert_eq!(*seen.lock(), vec![0, 1]);
}

#[test]
fn test_listener_may_read_model() {
    let (controller, _outbound, _dir) = controller(DeviceType::Unknown);
    let controller = Arc::new(controller);
    let observed = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&controller);
    let slot = observed.clone();
    controller.on_registry_changed(move |_| {
        if let Some(controller) = weak.upgrade() {
            *slot.lock() = Some(controller.device_type());
        }
    });

    controller
        .handle_payload(&payload(json!({
            "info": {"module": [
                {"name": "mc", "hw_ver": "AP05"},
                {"name": "ams/0", "sn": "A"}
            ]}
        })))
        .unwrap();

    assert_eq!(*observed.lock(), Some(DeviceType::X1C));
    assert!(controller.supports_feature(Feature::ChamberFan));
}

#[test]
fn test_type_resolution_is_announced() {
    let (controller, _outbound, _dir) = controller(DeviceType::Unknown);
    let mut events = controller.events().receiver();

    let summary = controller
        .handle_payload(&payload(json!({
            "info": {"module": [{"name": "esp32", "hw_ver": "AP04", "project_name": "C11"}]}
        })))
        .unwrap();
    assert_eq!(summary.device_type_resolved, Some(DeviceType::P1P));

    match events.try_recv() {
        Ok(AppEvent::Device(DeviceEvent::TypeResolved { device_type, .. })) => {
            assert_eq!(device_type, DeviceType::P1P)
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_payload_applied_at_given_instant() {
    let (controller, _outbound, _dir) = controller(DeviceType::X1C);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();

    controller
        .handle_payload_at(
            &payload(json!({
                "info": {"module": [{"name": "ams/0", "sn": "A"}]},
                "print": {"mc_remaining_time": 90, "ams": {"tray_now": "2"}}
            })),
            now,
        )
        .unwrap();

    let (end_time, slot) =
        controller.with_device(|device| (device.info().end_time(), device.ams().active_slot()));
    assert_eq!(end_time, Some(Utc.with_ymd_and_hms(2024, 6, 1, 11, 30, 0).unwrap()));
    assert_eq!(slot, Some((0, 2)));
}

#[test]
fn test_light_command_needs_chamber_light() {
    let (controller, mut outbound, _dir) = controller(DeviceType::Unknown);
    let rejected = Arc::new(AtomicUsize::new(0));
    let counter = rejected.clone();
    controller.events().subscribe(
        EventFilter::Categories(vec![EventCategory::Command]),
        move |event| {
            if let AppEvent::Command(CommandEvent::Rejected { .. }) = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    let err = controller
        .send_command(PrinterCommand::SetLight {
            node: "chamber_light".to_string(),
            mode: LightMode::On,
        })
        .unwrap_err();
    assert!(err.is_command_error());
    assert!(outbound.try_recv().is_err());
    assert_eq!(rejected.load(Ordering::SeqCst), 1);

    controller.request_full_status().unwrap();
    assert!(outbound.try_recv().is_ok());
}

#[test]
fn test_closed_transport_surfaces_error() {
    let (controller, outbound, _dir) = controller(DeviceType::X1C);
    drop(outbound);
    let err = controller.send_command(PrinterCommand::Pause).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
