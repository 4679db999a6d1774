use stowplan::error::PlacementError;
use stowplan::geometry;
use stowplan::model::{ContainerBlueprint, Item};
use stowplan::optimizer::{
    PackingConfig, PackingResult, PlacementEvent, UnplacedReason, pack_items_with_config,
    pack_items_with_progress,
};
use stowplan::search::support_ratio;
use stowplan::types::{Dimensional, Dimensions, EPSILON_GENERAL, Position, Positioned};

fn config() -> PackingConfig {
    PackingConfig::builder().resolution(1).build()
}

fn blueprint(id: &str, zone: &str, dims: (f64, f64, f64)) -> ContainerBlueprint {
    ContainerBlueprint::new(id, zone, Dimensions::new(dims.0, dims.1, dims.2)).into_inner()
}

fn item(id: &str, dims: (f64, f64, f64), priority: i32, zone: &str) -> Item {
    Item::new(id, id, Dimensions::new(dims.0, dims.1, dims.2), 1.0)
        .into_inner()
        .with_priority(priority)
        .with_preferred_zone(zone)
}

/// Deterministic mixed workload over two zones.
fn mixed_workload() -> (Vec<Item>, Vec<ContainerBlueprint>) {
    let items = (0..40)
        .map(|i| {
            let dims = (
                5.0 + f64::from(i % 7) * 2.0,
                4.0 + f64::from(i % 5) * 3.0,
                3.0 + f64::from(i % 4) * 4.0,
            );
            let zone = if i % 3 == 0 { "B" } else { "A" };
            let mut it = item(&format!("item-{i:02}"), dims, 1 + i % 10, zone);
            if i % 4 != 0 {
                it = it.with_expiry(format!("2026-{:02}-01", 1 + i % 12));
            }
            it
        })
        .collect();
    let containers = vec![
        blueprint("alpha", "A", (40.0, 30.0, 30.0)),
        blueprint("beta", "B", (40.0, 30.0, 30.0)),
    ];
    (items, containers)
}

fn assert_invariants(result: &PackingResult) {
    for container in &result.containers {
        let placed = container.placed();

        for p in placed {
            assert!(
                geometry::fits_inside(container.dims(), p.position(), p.dimensions(), EPSILON_GENERAL),
                "{} leaves container {}",
                p.item().id(),
                container.id()
            );
        }

        let gridded: Vec<_> = placed.iter().filter(|p| !p.is_preassigned()).cloned().collect();
        assert_eq!(geometry::first_overlap(&gridded, EPSILON_GENERAL), None);
        for (i, a) in gridded.iter().enumerate() {
            for b in &gridded[i + 1..] {
                assert!(!a.cells().unwrap().intersects(b.cells().unwrap()));
            }
        }

        let total = container.available_volume() + container.placed_volume();
        assert!((total - container.volume()).abs() < 1e-6);

        for p in &gridded {
            let cells = p.cells().unwrap();
            if cells.origin.z > 0 {
                assert!(support_ratio(container, cells) >= 0.5, "{} floats", p.item().id());
                let resting = geometry::supported_area(p, &gridded, EPSILON_GENERAL);
                assert!(
                    resting >= 0.5 * p.dimensions().base_area() - 1e-9,
                    "{} rests on {resting}",
                    p.item().id()
                );
            }
        }
    }
}

#[test]
fn single_item_in_empty_container() {
    let result = pack_items_with_config(
        vec![item("i1", (50.0, 50.0, 50.0), 5, "A")],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        config(),
    )
    .unwrap();

    assert!(result.is_complete());
    let placement = result.placement_of("i1").unwrap();
    assert_eq!(placement.container_id, "c1");
    // Priority 5 is not above the threshold, so the search starts at the back.
    assert_eq!(placement.position, Position::new(0.0, 50.0, 0.0));
    assert!(!placement.stacked);

    let front = pack_items_with_config(
        vec![item("i1", (50.0, 50.0, 50.0), 6, "A")],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        config(),
    )
    .unwrap();
    assert_eq!(front.placement_of("i1").unwrap().position, Position::origin());
}

#[test]
fn second_large_cube_does_not_fit() {
    let result = pack_items_with_config(
        vec![
            item("first", (60.0, 60.0, 60.0), 5, "A"),
            item("second", (60.0, 60.0, 60.0), 5, "A"),
        ],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        config(),
    )
    .unwrap();

    assert_eq!(
        result.placement_of("first").unwrap().position,
        Position::new(0.0, 40.0, 0.0)
    );
    let unplaced = result.unplaced("second").unwrap();
    assert_eq!(unplaced.reason, UnplacedReason::NoSuitablePosition);
    assert_eq!(unplaced.reason.to_string(), "no suitable position found");
}

#[test]
fn large_cubes_at_default_resolution() {
    let result = pack_items_with_config(
        vec![
            item("first", (60.0, 60.0, 60.0), 5, "A"),
            item("second", (60.0, 60.0, 60.0), 5, "A"),
        ],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        PackingConfig::default(),
    )
    .unwrap();

    assert_eq!(
        result.placement_of("first").unwrap().position,
        Position::new(0.0, 40.0, 0.0)
    );
    assert_eq!(
        result.unplaced("second").unwrap().reason,
        UnplacedReason::NoSuitablePosition
    );
}

#[test]
fn undated_items_go_first_at_equal_priority() {
    let dated = item("dated", (10.0, 10.0, 10.0), 5, "A").with_expiry("2026-01-01");
    let undated = item("undated", (10.0, 10.0, 10.0), 5, "A");
    let result = pack_items_with_config(
        vec![dated, undated],
        vec![blueprint("c1", "A", (10.0, 10.0, 10.0))],
        config(),
    )
    .unwrap();

    assert_eq!(result.placement_of("undated").unwrap().position, Position::origin());
    assert_eq!(
        result.unplaced("dated").unwrap().reason,
        UnplacedReason::NoSuitablePosition
    );
}

#[test]
fn zone_enforcement_without_matching_container() {
    let result = pack_items_with_config(
        vec![item("i1", (10.0, 10.0, 10.0), 5, "A")],
        vec![blueprint("c1", "B", (100.0, 100.0, 100.0))],
        PackingConfig::builder().resolution(1).enforce_zones(true).build(),
    )
    .unwrap();

    let unplaced = result.unplaced("i1").unwrap();
    assert_eq!(unplaced.reason.code(), "no_matching_zone");
    assert_eq!(
        unplaced.reason.to_string(),
        "no containers available with matching zone A"
    );
    assert_eq!(result.stats_for("c1").unwrap().items_placed, 0);
}

#[test]
fn zone_enforcement_with_item_lacking_zone() {
    let loose = Item::new("i1", "loose", Dimensions::new(1.0, 1.0, 1.0), 1.0).into_inner();
    let result = pack_items_with_config(
        vec![loose],
        vec![blueprint("c1", "A", (10.0, 10.0, 10.0))],
        PackingConfig::builder().resolution(1).enforce_zones(true).build(),
    )
    .unwrap();

    assert_eq!(
        result.unplaced("i1").unwrap().reason.to_string(),
        "no containers available with matching zone (none)"
    );
}

#[test]
fn oversized_item_is_skipped() {
    let result = pack_items_with_config(
        vec![item("wide", (200.0, 50.0, 50.0), 5, "A")],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        config(),
    )
    .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.unplaced("wide").unwrap().reason, UnplacedReason::NoSuitablePosition);
}

#[test]
fn stacks_on_full_support() {
    let result = pack_items_with_config(
        vec![
            item("b", (100.0, 100.0, 20.0), 3, "A"),
            item("a", (100.0, 100.0, 20.0), 9, "A"),
        ],
        vec![blueprint("c1", "A", (100.0, 100.0, 50.0))],
        config(),
    )
    .unwrap();

    assert_eq!(result.placement_of("a").unwrap().position, Position::origin());
    let b = result.placement_of("b").unwrap();
    assert_eq!(b.position, Position::new(0.0, 0.0, 20.0));
    assert!(b.stacked);
    assert_invariants(&result);
}

#[test]
fn stacks_at_default_resolution() {
    let result = pack_items_with_config(
        vec![
            item("b", (100.0, 100.0, 20.0), 3, "A"),
            item("a", (100.0, 100.0, 20.0), 9, "A"),
        ],
        vec![blueprint("c1", "A", (100.0, 100.0, 50.0))],
        PackingConfig::default(),
    )
    .unwrap();

    assert_eq!(result.placement_of("a").unwrap().position, Position::origin());
    let b = result.placement_of("b").unwrap();
    assert_eq!(b.position, Position::new(0.0, 0.0, 20.0));
    assert!(b.stacked);
    assert_invariants(&result);
}

#[test]
fn utilization_is_reported_in_percent() {
    let result = pack_items_with_config(
        vec![item("i1", (50.0, 50.0, 50.0), 5, "A")],
        vec![blueprint("c1", "A", (100.0, 100.0, 100.0))],
        config(),
    )
    .unwrap();

    let stats = result.stats_for("c1").unwrap();
    assert!((stats.volume_utilization - 12.5).abs() < 1e-9);
    assert!((stats.available_volume - 875_000.0).abs() < 1e-6);
    assert!((stats.total_volume - 1_000_000.0).abs() < 1e-6);
    assert_eq!(stats.zone, "A");
}

#[test]
fn mixed_workload_respects_invariants() {
    let (items, containers) = mixed_workload();
    let total = items.len();
    let result = pack_items_with_config(items, containers, config()).unwrap();

    assert_eq!(result.placed_count() + result.unplaced_count(), total);
    assert!(result.placed_count() > 0);
    assert!(result.successful_placements.iter().any(|p| p.stacked));
    assert_invariants(&result);
}

#[test]
fn enforced_zones_match_container_zones() {
    let (items, containers) = mixed_workload();
    let zones: Vec<(String, String)> = items
        .iter()
        .map(|i| (i.id().to_string(), i.preferred_zone().unwrap_or_default().to_string()))
        .collect();
    let enforced = PackingConfig::builder().resolution(1).enforce_zones(true).build();
    let result = pack_items_with_config(items, containers, enforced).unwrap();

    for placement in &result.successful_placements {
        let container_zone = &result.stats_for(&placement.container_id).unwrap().zone;
        let (_, item_zone) = zones.iter().find(|(id, _)| *id == placement.item_id).unwrap();
        assert_eq!(container_zone, item_zone);
    }
    assert_invariants(&result);
}

#[test]
fn runs_are_deterministic() {
    let run = || {
        let (items, containers) = mixed_workload();
        let mut events = Vec::new();
        let result =
            pack_items_with_progress(items, containers, config(), |evt| events.push(evt.clone()))
                .unwrap();
        (events, result.successful_placements)
    };

    let (events_a, placements_a) = run();
    let (events_b, placements_b) = run();
    assert_eq!(events_a, events_b);
    assert_eq!(placements_a, placements_b);

    let order: Vec<i32> = events_a
        .iter()
        .filter_map(|e| match e {
            PlacementEvent::ItemStarted { priority, .. } => Some(*priority),
            _ => None,
        })
        .collect();
    assert!(order.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn preassigned_items_keep_their_position() {
    let fixed = item("fixed", (10.0, 10.0, 10.0), 5, "A").with_position(Position::new(30.0, 20.0, 0.0));
    let result = pack_items_with_config(
        vec![fixed, item("free", (10.0, 10.0, 10.0), 5, "A")],
        vec![blueprint("c1", "A", (50.0, 50.0, 50.0))],
        config(),
    )
    .unwrap();

    let placement = result.placement_of("fixed").unwrap();
    assert!(placement.preassigned);
    assert_eq!(placement.position, Position::new(30.0, 20.0, 0.0));

    let container = &result.containers[0];
    let free = container
        .placed()
        .iter()
        .find(|p| p.item().id() == "free")
        .unwrap();
    assert_eq!(
        container.grid().occupied_cells(),
        free.cells().unwrap().extent.cell_count() as usize
    );
    assert!((container.available_volume() - (125_000.0 - free.volume())).abs() < 1e-6);
    assert_eq!(result.stats_for("c1").unwrap().items_placed, 2);
}

#[test]
fn structural_faults_are_errors() {
    let err = pack_items_with_config(
        vec![item("i1", (1.0, 1.0, 1.0), 0, "A")],
        vec![blueprint("c1", "A", (10.0, 10.0, 10.0))],
        config(),
    )
    .unwrap_err();
    assert!(matches!(err, PlacementError::PriorityOutOfRange { .. }));

    let err = pack_items_with_config(
        vec![],
        vec![blueprint("huge", "A", (1e6, 1e6, 1e6))],
        PackingConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "grid_too_large");
}
