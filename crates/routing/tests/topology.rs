//! Layering invariants on synthetic drainage grids.

mod common;

use common::{comb, comb_grid, three_layer_reaches, EAST};
use rivulet_core::{Error, Raster};
use rivulet_routing::topology::{
    build_flow_indices, build_routing_layers, partition_reaches, FlowIndex, FlowIndexParams, LayerOrigin,
    ReachChains, RoutingLayers,
};

fn assert_valid(index: &FlowIndex, layers: &RoutingLayers) {
    let n = index.n_nodes();
    let mut seen = vec![0usize; n];
    for layer in layers.layers() {
        for &node in layer {
            seen[node] += 1;
        }
    }
    assert!(seen.iter().all(|&c| c == 1), "every node in exactly one layer: {seen:?}");

    for u in 0..n {
        if let Some(d) = index.downstream(u) {
            assert!(
                layers.layer_of(u) < layers.layer_of(d),
                "edge {u} -> {d} goes from layer {} to layer {}",
                layers.layer_of(u),
                layers.layer_of(d)
            );
        }
    }
}

#[test]
fn test_layers_respect_every_edge() {
    for (rows, cols) in [(1, 1), (1, 6), (4, 4), (7, 3), (12, 9)] {
        let topo = comb(rows, cols);
        for origin in [LayerOrigin::FromSource, LayerOrigin::FromOutlet] {
            let layers = build_routing_layers(&topo.index, origin).unwrap();
            assert_valid(&topo.index, &layers);
            assert!(layers.is_valid_for(&topo.index));
        }
    }
}

#[test]
fn test_layering_is_deterministic() {
    let topo = comb(9, 7);
    let first = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
    for _ in 0..5 {
        let again = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
        assert_eq!(first.n_layers(), again.n_layers());
        for (a, b) in first.layers().iter().zip(again.layers()) {
            let mut a = a.clone();
            let mut b = b.clone();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }
}

#[test]
fn test_comb_layer_count() {
    // Longest path: across the top row, then down the last column
    let topo = comb(4, 5);
    let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
    assert_eq!(layers.n_layers(), 4 + 3 + 1);
    assert_eq!(topo.index.outlets().count(), 1);
}

#[test]
fn test_count_prefixed_exports() {
    let topo = comb(3, 3);
    for entry in topo.index.to_count_prefixed() {
        assert_eq!(entry[0] as usize, entry.len() - 1);
    }
    let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
    let exported = layers.to_count_prefixed();
    assert_eq!(exported.len(), layers.n_layers());
    let total: i64 = exported.iter().map(|l| l[0]).sum();
    assert_eq!(total as usize, topo.index.n_nodes());
}

#[test]
fn test_cyclic_grid_is_rejected() {
    // East then west: the two cells drain into each other
    let grid = Raster::from_vec(vec![EAST, 5], 1, 2).unwrap();
    let result = build_flow_indices(&grid, &FlowIndexParams::default())
        .and_then(|topo| build_routing_layers(&topo.index, LayerOrigin::FromSource));
    assert!(
        matches!(result, Err(Error::CycleDetected { .. }) | Err(Error::Topology { .. })),
        "{result:?}"
    );
}

#[test]
fn test_reach_layers_and_partition() {
    let (_, topo) = three_layer_reaches();
    assert_eq!(topo.layers.n_layers(), 3);
    assert_eq!(topo.outlets(), vec![4]);
    assert_valid(&topo.index, &topo.layers);

    let partition = partition_reaches(&topo, &[1.0; 5], 2).unwrap();
    let mut members: Vec<usize> = (0..partition.n_groups()).flat_map(|g| partition.members(g).to_vec()).collect();
    members.sort_unstable();
    assert_eq!(members, vec![0, 1, 2, 3, 4]);
    for r in partition.boundary_reaches(&topo) {
        let d = topo.downstream(r).unwrap();
        assert_ne!(partition.group_of(r), partition.group_of(d));
    }
}

#[test]
fn test_reach_chains_on_comb() {
    // Top row is reach 1, the last column below it is reach 2
    let grid = comb_grid(3, 3);
    let topo = build_flow_indices(&grid, &FlowIndexParams::default()).unwrap();
    let id = |r: usize, c: usize| topo.layout.id(r, c).unwrap();
    let mut link = vec![0i64; topo.index.n_nodes()];
    for c in 0..3 {
        link[id(0, c)] = 1;
    }
    link[id(1, 2)] = 2;
    link[id(2, 2)] = 2;

    let chains = ReachChains::build(&topo.index, &link, 2).unwrap();
    assert_eq!(chains.chain(0), &[id(0, 0), id(0, 1), id(0, 2)]);
    assert_eq!(chains.chain(1), &[id(1, 2), id(2, 2)]);
    assert_eq!(chains.outlet_cell(1), Some(id(2, 2)));
    assert_eq!(chains.reach_of(id(1, 0)), None);
}
