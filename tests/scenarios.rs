use std::sync::Arc;
use std::thread;

use urbtap::analyzer::{
    ConfigurationOutcome, DescriptorWalker, Phase, TransferKind, UrbAnalyzer, WalkError,
};
use urbtap::model::{DeviceAddress, EndpointDescriptor, PipeHandle, TransferType, UrbFunction};
use urbtap::registry::EndpointRegistry;
use urbtap::roothub::RootHubs;
use urbtap::sink::CollectSink;
use urbtap::trace::{Replay, Trace};
use urbtap::urb::{InterfaceSpec, PipeSpec, Urb, UrbBody, UrbBuilder, layout};

const PIPE_A: u64 = 0xFFFF_A000_0000_1000;
const PIPE_B: u64 = 0xFFFF_A000_0000_2000;

fn configuration() -> Vec<u8> {
    UrbBuilder::select_configuration(&[InterfaceSpec::new(vec![
        PipeSpec::new(PIPE_A, 0x81, TransferType::Bulk),
        PipeSpec::new(PIPE_B, 0x02, TransferType::Interrupt),
    ])]).unwrap()
}

fn configured_registry() -> EndpointRegistry {
    let registry = EndpointRegistry::new();
    let raw = configuration();
    let urb = Urb::parse(&raw).unwrap();
    UrbAnalyzer::new(&registry).analyze(&urb, Phase::Complete);
    registry
}

#[test]
fn configuration_return_registers_pipes() {
    let registry = configured_registry();

    assert_eq!(registry.len(), 2);
    let a = registry.lookup(PipeHandle(PIPE_A)).unwrap();
    assert_eq!(a.transfer_type, TransferType::Bulk);
    assert_eq!(a.address, 0x81);
    let b = registry.lookup(PipeHandle(PIPE_B)).unwrap();
    assert_eq!(b.transfer_type, TransferType::Interrupt);
    assert_eq!(b.address, 0x02);
    assert_eq!(b.device_address, DeviceAddress::Unresolved);
}

#[test]
fn bulk_transfer_resolves_registered_pipe() {
    let registry = configured_registry();
    let raw = UrbBuilder::bulk(PipeHandle(PIPE_A))
        .buffer(&[0xAA; 13])
        .buffer_length(13)
        .build();
    let urb = Urb::parse(&raw).unwrap();

    let record = UrbAnalyzer::new(&registry).analyze(&urb, Phase::Submit);
    assert_eq!(record.function, UrbFunction::BulkOrInterruptTransfer);
    assert_eq!(record.endpoint, registry.lookup(PipeHandle(PIPE_A)));
    assert_eq!(record.buffer_length, Some(13));
    assert_eq!(record.buffer.as_deref(), Some(&[0xAA; 13][..]));
}

#[test]
fn bulk_transfer_on_unregistered_pipe_is_not_an_error() {
    let registry = configured_registry();
    let raw = UrbBuilder::bulk(PipeHandle(0xDEAD_0000))
        .status(0xC000_0011)
        .buffer(b"hello")
        .build();
    let urb = Urb::parse(&raw).unwrap();

    let record = UrbAnalyzer::new(&registry).analyze(&urb, Phase::Complete);
    assert!(record.endpoint.is_none());
    assert_eq!(record.pipe, Some(PipeHandle(0xDEAD_0000)));
    assert_eq!(record.status, 0xC000_0011);
    assert_eq!(record.buffer_length, Some(5));
    assert_eq!(record.buffer.as_deref(), Some(&b"hello"[..]));
}

#[test]
fn control_transfer_with_null_buffer() {
    let registry = EndpointRegistry::new();
    let setup = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00];
    let raw = UrbBuilder::control(PipeHandle(0), setup)
        .buffer_length(18)
        .build();
    assert_eq!(raw.len(), layout::CONTROL_DATA);
    let urb = Urb::parse(&raw).unwrap();

    let record = UrbAnalyzer::new(&registry).analyze(&urb, Phase::Submit);
    let TransferKind::Control { setup: parsed, .. } = record.kind else {
        panic!("expected control record, got {:?}", record.kind);
    };
    assert_eq!(parsed.0, setup);
    assert_eq!(parsed.length(), 18);
    assert_eq!(record.buffer_length, Some(18));
    assert!(record.buffer.is_none());
}

#[test]
fn replaying_configuration_is_idempotent() {
    let registry = EndpointRegistry::new();
    let raw = configuration();
    let Ok(Urb {
        body: UrbBody::SelectConfiguration(select),
        ..
    }) = Urb::parse(&raw)
    else {
        panic!("expected select configuration");
    };

    let walker = DescriptorWalker::new(&registry, DeviceAddress::Unresolved);
    walker.walk(select.interfaces).unwrap();
    let once = registry.snapshot();
    walker.walk(select.interfaces).unwrap();
    assert_eq!(registry.snapshot(), once);
}

#[test]
fn walk_visits_every_interface_then_stops() {
    let interfaces: Vec<InterfaceSpec> = (0..4u64)
        .map(|i| {
            InterfaceSpec::new(vec![PipeSpec::new(
                0x100 + i,
                0x81 + i as u8,
                TransferType::Interrupt,
            )])
        })
        .collect();
    let raw = UrbBuilder::select_configuration(&interfaces).unwrap();
    let payload = &raw[layout::SELECT_CONFIGURATION_INTERFACES..];

    let registry = EndpointRegistry::new();
    let summary = DescriptorWalker::new(&registry, DeviceAddress::Unresolved)
        .walk(payload)
        .unwrap();
    assert_eq!(summary.interfaces, 4);
    assert_eq!(summary.pipes, 4);
    assert_eq!(registry.len(), 4);
}

#[test]
fn corrupted_length_is_reported_without_registering() {
    let mut second = InterfaceSpec::new(vec![PipeSpec::new(PIPE_B, 0x02, TransferType::Bulk)]);
    second.declared_length = Some(0x4000);
    let raw = UrbBuilder::select_configuration(&[
        InterfaceSpec::new(vec![PipeSpec::new(PIPE_A, 0x81, TransferType::Bulk)]),
        second,
    ]).unwrap();
    let urb = Urb::parse(&raw).unwrap();

    let registry = EndpointRegistry::new();
    let record = UrbAnalyzer::new(&registry).analyze(&urb, Phase::Complete);
    assert!(matches!(
        record.kind,
        TransferKind::SelectConfiguration(ConfigurationOutcome::Rejected(WalkError::Overrun { .. }))
    ));
    assert!(registry.is_empty());
}

#[test]
fn every_function_code_yields_one_record() {
    let registry = EndpointRegistry::new();
    let analyzer = UrbAnalyzer::new(&registry);

    // 112 bytes covers every fixed layout; 4 bytes truncates all of them.
    for body_len in [112, 4] {
        for function in (0u16..0x40).chain([0x7FFF, 0xFFFF]) {
            let raw = UrbBuilder::unknown(function, &vec![0u8; body_len]).unwrap();
            for phase in [Phase::Submit, Phase::Complete] {
                let record = analyzer.analyze_raw(&raw, phase);
                assert_eq!(record.function, UrbFunction::from(function));
                assert_eq!(record.phase, phase);
                if body_len == 112 {
                    assert!(!matches!(record.kind, TransferKind::Malformed { .. }));
                }
            }
        }
    }
}

#[test]
fn unknown_function_is_classified_as_unknown() {
    let registry = EndpointRegistry::new();
    let raw = UrbBuilder::unknown(0x7777, &[1, 2, 3]).unwrap();
    let urb = Urb::parse(&raw).unwrap();

    let record = UrbAnalyzer::new(&registry).analyze(&urb, Phase::Complete);
    assert_eq!(record.kind, TransferKind::Unknown { function: 0x7777 });
    assert!(registry.is_empty());
}

#[test]
fn concurrent_lookups_observe_completed_inserts() {
    let registry = Arc::new(EndpointRegistry::with_capacity(256));
    let endpoint = |pipe: u64, address: u8| EndpointDescriptor {
        address,
        transfer_type: TransferType::Bulk,
        device_address: DeviceAddress::Unresolved,
        pipe: PipeHandle(pipe),
    };

    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..64u64 {
                    let pipe = t * 0x1000 + i;
                    registry.insert_or_replace(PipeHandle(pipe), endpoint(pipe, 0x01));
                    registry.insert_or_replace(PipeHandle(pipe), endpoint(pipe, 0x81));
                    assert_eq!(registry.lookup(PipeHandle(pipe)).map(|e| e.address), Some(0x81));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(registry.len(), 256);
    assert!(registry.snapshot().iter().all(|e| e.address == 0x81));
}

#[test]
fn trace_replay_keeps_root_hubs_apart() {
    let trace = Trace::from_toml(
        r#"
        [[event]]
        root_hub = 1
        phase = "submit"
        urb = { kind = "select_configuration" }

        [[event]]
        root_hub = 1
        [event.urb]
        kind = "select_configuration"
        [[event.urb.interfaces]]
        class = 8
        pipes = [
            { handle = "0xffffa00000001000", endpoint = 0x81, type = "bulk" },
            { handle = "0xffffa00000002000", endpoint = 0x02, type = "bulk" },
        ]

        [[event]]
        root_hub = 1
        urb = { kind = "bulk", pipe = "0xffffa00000001000", flags = 1, data = "55534253" }

        [[event]]
        root_hub = 2
        urb = { kind = "bulk", pipe = "0xffffa00000001000", flags = 1, data = "55534253" }
        "#,
    )
    .unwrap();

    let mut hubs = RootHubs::new(16);
    let mut sink = CollectSink::new(4096);
    let stats = Replay::new(&trace).run(&mut hubs, &mut sink).unwrap();

    assert_eq!(stats.records, 4);
    assert!(matches!(
        sink.records[0].record.kind,
        TransferKind::SelectConfiguration(ConfigurationOutcome::Pending)
    ));
    assert_eq!(
        sink.records[2].record.endpoint.map(|e| e.address),
        Some(0x81)
    );
    assert!(sink.records[3].record.endpoint.is_none());
    assert_eq!(hubs.get(1).map(|r| r.len()), Some(2));
    assert_eq!(hubs.get(2).map(|r| r.len()), Some(0));
}
