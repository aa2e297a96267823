//! Unit and closed-loop tests for the rescue subsystem.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use ev_core::VertexId;
use ev_graph::{BuildingGraph, BuildingGraphBuilder, VertexKind};

use crate::item::ItemExecutionPlan;
use crate::optimizer::{GreedySelector, ItemSelector, Optimizer, SelectorStart};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// `exit ─ r0 ─ r1 ─ r2`, unit edges, one incapable per room by convention
/// of the demand maps below.
fn corridor() -> (BuildingGraph, VertexId, [VertexId; 3]) {
    let mut b = BuildingGraphBuilder::new();
    let exit = b.add_vertex(VertexKind::Exit, 0, (0.0, 0.0));
    let r0 = b.add_vertex(VertexKind::Room, 0, (1.0, 0.0));
    let r1 = b.add_vertex(VertexKind::Room, 0, (2.0, 0.0));
    let r2 = b.add_vertex(VertexKind::Room, 0, (3.0, 0.0));
    b.add_edge(exit, r0, 4, 1.0, 0.0, 1.0);
    b.add_edge(r0, r1, 4, 1.0, 0.0, 1.0);
    b.add_edge(r1, r2, 4, 1.0, 0.0, 1.0);
    (b.build(), exit, [r0, r1, r2])
}

fn demand_of(rooms: &[(VertexId, u32)]) -> BTreeMap<VertexId, u32> {
    rooms.iter().copied().collect()
}

// ── Item generation ───────────────────────────────────────────────────────────

#[cfg(test)]
mod generation_tests {
    use super::*;

    #[test]
    fn corridor_produces_one_triple_pickup() {
        // Three incapables at the end of a long approach corridor with K=3:
        // amortizing the approach makes the three-room item the best value
        // density, so greedy selects exactly it.
        let mut b = BuildingGraphBuilder::new();
        let exit = b.add_vertex(VertexKind::Exit, 0, (0.0, 0.0));
        let r0 = b.add_vertex(VertexKind::Room, 0, (5.0, 0.0));
        let r1 = b.add_vertex(VertexKind::Room, 0, (6.0, 0.0));
        let r2 = b.add_vertex(VertexKind::Room, 0, (7.0, 0.0));
        b.add_edge(exit, r0, 4, 1.0, 0.0, 5.0);
        b.add_edge(r0, r1, 4, 1.0, 0.0, 1.0);
        b.add_edge(r1, r2, 4, 1.0, 0.0, 1.0);
        let graph = b.build();
        let demand = demand_of(&[(r0, 1), (r1, 1), (r2, 1)]);
        let optimizer = Optimizer::new(3);
        let items = optimizer.generate(&graph, r2, &demand);

        assert!(!items.is_empty());
        // Item legality for every emitted item.
        for item in &items {
            assert!(item.passengers() <= 3);
            for (room, count) in &item.vector {
                assert!(*count <= demand[room]);
            }
            for pair in item.full_path.windows(2) {
                assert!(graph.adjacent(pair[0], pair[1]), "path uses a missing edge");
            }
            assert_eq!(item.full_path[0], item.entry_exit);
            assert_eq!(*item.full_path.last().unwrap(), item.drop_exit);
        }

        // The best item by value grabs all three rooms in corridor order.
        let best = items
            .iter()
            .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap())
            .unwrap();
        assert_eq!(best.visit_sequence, vec![r0, r1, r2]);
        assert_eq!(best.passengers(), 3);
        assert_eq!(best.entry_exit, exit);
        assert_eq!(best.drop_exit, exit);
        // 5 m entry unloaded + (1+1) m loaded between rooms + 7 m loaded out.
        assert!((best.time - (5.0 + 2.0 * 2.0 + 2.0 * 7.0)).abs() < 1e-9);

        // And greedy assignment therefore issues exactly one item.
        let starts = vec![SelectorStart { position: exit, busy_time: 0.0, available: true }];
        let queues = GreedySelector.assign(&graph, items, &demand, &starts);
        assert_eq!(queues[0].len(), 1);
        assert_eq!(queues[0][0].visit_sequence, vec![r0, r1, r2]);
    }

    #[test]
    fn empty_demand_yields_no_items() {
        let (graph, _, [r0, _, _]) = corridor();
        let optimizer = Optimizer::new(3);
        assert!(optimizer.generate(&graph, r0, &BTreeMap::new()).is_empty());
        assert!(optimizer
            .generate(&graph, r0, &demand_of(&[(r0, 0)]))
            .is_empty());
    }

    #[test]
    fn unreachable_rooms_excluded() {
        let (mut graph, _, [r0, r1, r2]) = corridor();
        // Sever r2 from the world.
        let e = graph.edge_between(r1, r2).unwrap();
        graph.clear_edge(e);
        let demand = demand_of(&[(r0, 1), (r2, 1)]);
        let items = Optimizer::new(3).generate(&graph, r0, &demand);
        assert!(!items.is_empty());
        assert!(items.iter().all(|item| !item.vector.contains_key(&r2)));
    }

    #[test]
    fn dominated_pairs_pruned() {
        // Two rooms on opposite branches of an exit: visiting both in one
        // trip costs at least the two shuttles, so every pair is pruned.
        let mut b = BuildingGraphBuilder::new();
        let exit = b.add_vertex(VertexKind::Exit, 0, (0.0, 0.0));
        let left = b.add_vertex(VertexKind::Room, 0, (-1.0, 0.0));
        let right = b.add_vertex(VertexKind::Room, 0, (1.0, 0.0));
        b.add_edge(exit, left, 4, 1.0, 0.0, 1.0);
        b.add_edge(exit, right, 4, 1.0, 0.0, 1.0);
        let graph = b.build();

        let demand = demand_of(&[(left, 1), (right, 1)]);
        let items = Optimizer::new(2).generate(&graph, exit, &demand);
        assert!(items.iter().all(|item| item.vector.len() == 1));
    }

    #[test]
    fn budget_overflow_degrades_k() {
        let (graph, _, [r0, r1, r2]) = corridor();
        let demand = demand_of(&[(r0, 1), (r1, 1), (r2, 1)]);
        let mut optimizer = Optimizer::new(3);
        optimizer.max_candidates = 1; // force K down to 1
        let items = optimizer.generate(&graph, r2, &demand);
        assert!(!items.is_empty());
        assert!(items.iter().all(|item| item.vector.len() == 1));
    }

    #[test]
    fn under_capacity_penalty_discounts_partial_loads() {
        let (graph, _, [r0, _, _]) = corridor();
        let demand = demand_of(&[(r0, 1)]);

        let plain = Optimizer::new(3).generate(&graph, r0, &demand);
        let mut penalizing = Optimizer::new(3);
        penalizing.under_capacity_penalty = 0.3;
        let penalized = penalizing.generate(&graph, r0, &demand);

        let v_plain = plain[0].value;
        let v_pen = penalized[0].value;
        // One passenger with K=3: multiplier 1 − 0.3·2 = 0.4.
        assert!((v_pen / v_plain - 0.4).abs() < 1e-9);
    }

    #[test]
    fn fire_weight_prefers_rooms_near_origin() {
        // Symmetric corridor: exit ─ near ─ mid ─ far ─ exit2, with the fire
        // at one end.  Equal priorities, equal shuttle shapes.
        let mut b = BuildingGraphBuilder::new();
        let x0 = b.add_vertex(VertexKind::Exit, 0, (0.0, 0.0));
        let near = b.add_vertex(VertexKind::Room, 0, (1.0, 0.0));
        let mid = b.add_vertex(VertexKind::Hallway, 0, (2.0, 0.0));
        let far = b.add_vertex(VertexKind::Room, 0, (3.0, 0.0));
        let x1 = b.add_vertex(VertexKind::Exit, 0, (4.0, 0.0));
        let fire = b.add_vertex(VertexKind::Room, 0, (1.0, 1.0));
        b.add_edge(x0, near, 4, 1.0, 0.0, 1.0);
        b.add_edge(near, mid, 4, 1.0, 0.0, 1.0);
        b.add_edge(mid, far, 4, 1.0, 0.0, 1.0);
        b.add_edge(far, x1, 4, 1.0, 0.0, 1.0);
        b.add_edge(fire, near, 4, 1.0, 0.0, 1.0);
        let graph = b.build();

        let demand = demand_of(&[(near, 1), (far, 1)]);
        let mut optimizer = Optimizer::new(1); // shuttles only
        optimizer.fire_priority_weight = 2.0;
        let items = optimizer.generate(&graph, fire, &demand);

        let value_of = |room: VertexId| {
            items
                .iter()
                .find(|i| i.vector.contains_key(&room))
                .unwrap()
                .value
        };
        assert!(
            value_of(near) > value_of(far),
            "fire-adjacent room must outrank the distant one"
        );
    }
}

// ── Assignment ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod assignment_tests {
    use super::*;

    #[test]
    fn assignment_respects_supply() {
        let (graph, exit, [r0, r1, r2]) = corridor();
        let demand = demand_of(&[(r0, 2), (r1, 1), (r2, 1)]);
        let items = Optimizer::new(2).generate(&graph, r2, &demand);
        let starts = vec![
            SelectorStart { position: exit, busy_time: 0.0, available: true },
            SelectorStart { position: exit, busy_time: 0.0, available: true },
        ];
        let queues = GreedySelector.assign(&graph, items, &demand, &starts);

        // Disjointness: total committed per room never exceeds supply.
        let mut committed: BTreeMap<VertexId, u32> = BTreeMap::new();
        for queue in &queues {
            for item in queue {
                for (&room, &count) in &item.vector {
                    *committed.entry(room).or_insert(0) += count;
                }
            }
        }
        for (room, &count) in &committed {
            assert!(count <= demand[room], "room {room} oversubscribed");
        }
        // And everything deliverable was in fact committed.
        assert_eq!(committed.values().sum::<u32>(), 4);
    }

    #[test]
    fn unavailable_responders_get_nothing() {
        let (graph, exit, [r0, _, _]) = corridor();
        let demand = demand_of(&[(r0, 1)]);
        let items = Optimizer::new(3).generate(&graph, r0, &demand);
        let starts = vec![
            SelectorStart { position: exit, busy_time: 0.0, available: false },
            SelectorStart { position: exit, busy_time: 0.0, available: true },
        ];
        let queues = GreedySelector.assign(&graph, items, &demand, &starts);
        assert!(queues[0].is_empty());
        assert_eq!(queues[1].len(), 1);
    }

    #[test]
    fn busier_responder_passed_over() {
        let (graph, exit, [r0, _, _]) = corridor();
        let demand = demand_of(&[(r0, 1)]);
        let items = Optimizer::new(3).generate(&graph, r0, &demand);
        let starts = vec![
            SelectorStart { position: exit, busy_time: 100.0, available: true },
            SelectorStart { position: exit, busy_time: 0.0, available: true },
        ];
        let queues = GreedySelector.assign(&graph, items, &demand, &starts);
        assert!(queues[0].is_empty());
        assert_eq!(queues[1].len(), 1);
    }

    #[cfg(feature = "lp")]
    #[test]
    fn lp_selector_matches_supply_constraints() {
        use crate::optimizer::LpSelector;
        let (graph, exit, [r0, r1, r2]) = corridor();
        let demand = demand_of(&[(r0, 1), (r1, 1), (r2, 1)]);
        let items = Optimizer::new(3).generate(&graph, r2, &demand);
        let starts = vec![SelectorStart { position: exit, busy_time: 0.0, available: true }];
        let queues = LpSelector.assign(&graph, items, &demand, &starts);
        let mut committed: BTreeMap<VertexId, u32> = BTreeMap::new();
        for item in &queues[0] {
            for (&room, &count) in &item.vector {
                *committed.entry(room).or_insert(0) += count;
            }
        }
        for (room, &count) in &committed {
            assert!(count <= demand[room]);
        }
    }
}

// ── Execution plans ───────────────────────────────────────────────────────────

#[cfg(test)]
mod plan_tests {
    use super::*;

    fn one_item(graph: &BuildingGraph, demand: &BTreeMap<VertexId, u32>, origin: VertexId) -> crate::RescueItem {
        let items = Optimizer::new(3).generate(graph, origin, demand);
        items
            .into_iter()
            .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap())
            .unwrap()
    }

    #[test]
    fn pending_tracks_pickups() {
        let (graph, _, [r0, r1, r2]) = corridor();
        let demand = demand_of(&[(r0, 1), (r1, 2)]);
        let mut plan = ItemExecutionPlan::new(one_item(&graph, &demand, r2));
        assert_eq!(plan.total_pending(), plan.item.passengers());
        let first = plan.item.visit_sequence[0];
        let owed = plan.pending(first);
        *plan.picked_up.entry(first).or_insert(0) += owed;
        assert_eq!(plan.pending(first), 0);
        assert!(!plan.all_picked());
    }

    #[test]
    fn truncate_drops_unreachable_rooms() {
        let (mut graph, exit, [r0, r1, r2]) = corridor();
        let demand = demand_of(&[(r0, 1), (r1, 1), (r2, 1)]);
        let mut plan = ItemExecutionPlan::new(one_item(&graph, &demand, r2));
        assert_eq!(plan.item.visit_sequence, vec![r0, r1, r2]);

        // March to r0 and pick up there.
        plan.current_index = 1; // full_path = [exit, r0, ...]
        plan.picked_up.insert(r0, 1);

        // r2 falls off the map.
        let e = graph.edge_between(r1, r2).unwrap();
        graph.clear_edge(e);

        let reachable: FxHashSet<VertexId> = [r1].into_iter().collect();
        let unreachable: FxHashSet<VertexId> = [r2].into_iter().collect();
        let affected = plan.truncate_to_unaltered(&reachable, &unreachable, exit, &graph);

        assert_eq!(affected, demand_of(&[(r2, 1)]));
        assert_eq!(plan.item.visit_sequence, vec![r0, r1]);
        assert!(!plan.item.vector.contains_key(&r2));
        assert_eq!(plan.item.drop_exit, exit);
        // Rewritten path starts where the responder stands and stays on
        // existing edges.
        assert_eq!(plan.item.full_path[0], r0);
        assert_eq!(*plan.item.full_path.last().unwrap(), exit);
        for pair in plan.item.full_path.windows(2) {
            assert!(graph.adjacent(pair[0], pair[1]));
        }
        // r0's pickup is already accounted; only r1 still owed.
        assert_eq!(plan.total_pending(), 1);
    }

    #[test]
    fn truncate_with_nothing_left_completes() {
        let (mut graph, exit, [r0, _, _]) = corridor();
        let demand = demand_of(&[(r0, 1)]);
        let mut plan = ItemExecutionPlan::new(one_item(&graph, &demand, r0));
        plan.current_index = 1;
        plan.picked_up.insert(r0, 1);

        // Everything beyond r0 burns; exit unreachable too.
        let e = graph.edge_between(exit, r0).unwrap();
        graph.clear_edge(e);

        let affected = plan.truncate_to_unaltered(
            &FxHashSet::default(),
            &FxHashSet::default(),
            exit,
            &graph,
        );
        assert!(affected.is_empty());
        assert!(plan.completed, "no stops, no path: plan is spent");
    }
}

// ── Tactical execution (closed loop with the kernel) ──────────────────────────

#[cfg(test)]
mod tactical_tests {
    use super::*;
    use crate::tactical::TacticalCoordinator;
    use ev_graph::BuildingConfig;
    use ev_sim::SimulationBuilder;

    /// Kernel corridor matching the unit fixture: one incapable in each of
    /// three rooms, inert fire.
    fn corridor_config() -> BuildingConfig {
        BuildingConfig::from_json_str(
            r#"{
            "vertices": [
                { "id": "x",  "kind": "exit", "capacity": 100,
                  "area_m2": 4.0, "ceiling_height_m": 2.5,
                  "visual_position": { "x": 0.0, "y": 0.0 } },
                { "id": "r0", "kind": "room", "capacity": 8,
                  "area_m2": 20.0, "ceiling_height_m": 2.5,
                  "visual_position": { "x": 1.0, "y": 0.0 } },
                { "id": "r1", "kind": "room", "capacity": 8,
                  "area_m2": 20.0, "ceiling_height_m": 2.5,
                  "visual_position": { "x": 2.0, "y": 0.0 } },
                { "id": "r2", "kind": "room", "capacity": 8,
                  "area_m2": 20.0, "ceiling_height_m": 2.5,
                  "visual_position": { "x": 3.0, "y": 0.0 } },
                { "id": "f",  "kind": "room", "capacity": 1,
                  "area_m2": 10.0, "ceiling_height_m": 2.5,
                  "visual_position": { "x": 50.0, "y": 50.0 } }
            ],
            "edges": [
                { "id": "e0", "vertex_a": "x",  "vertex_b": "r0",
                  "max_flow": 4, "width_m": 1.2, "base_burn_rate": 0.0,
                  "unit_length": 5.0 },
                { "id": "e1", "vertex_a": "r0", "vertex_b": "r1",
                  "max_flow": 4, "width_m": 1.2, "base_burn_rate": 0.0 },
                { "id": "e2", "vertex_a": "r1", "vertex_b": "r2",
                  "max_flow": 4, "width_m": 1.2, "base_burn_rate": 0.0 }
            ],
            "occupancy_probabilities": [
                { "vertex_id": "r0", "incapable": [0.0, 1.0] },
                { "vertex_id": "r1", "incapable": [0.0, 1.0] },
                { "vertex_id": "r2", "incapable": [0.0, 1.0] }
            ],
            "fire_params": { "origin_vertex_id": "f" }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn enqueue_rejects_queue_count_mismatch() {
        use crate::RescueError;
        let mut tactical = TacticalCoordinator::new(2);
        let result = tactical.enqueue(vec![Vec::new()]); // one queue, two responders
        assert!(matches!(
            result,
            Err(RescueError::QueueCountMismatch { expected: 2, got: 1 })
        ));
        assert!(tactical.idle());
    }

    #[test]
    fn executes_a_full_item_to_completion() {
        let config = corridor_config();
        let mut sim = SimulationBuilder::new(&config, 1, 42).build().unwrap();
        let state = sim.read();

        // Ground truth is fine as demand here; fog-of-war is the model
        // facade's concern, not the executor's.
        let rooms: Vec<VertexId> = state
            .graph
            .vertex_ids()
            .filter(|&v| state.graph.vertex(v).kind.is_room() && !state.graph.vertex(v).burned)
            .collect();
        let demand: BTreeMap<VertexId, u32> = rooms.iter().map(|&r| (r, 1)).collect();

        let items = Optimizer::new(3).generate(&state.graph, state.fire_origin, &demand);
        let starts = vec![SelectorStart {
            position: state.responders[0].position,
            busy_time: 0.0,
            available: true,
        }];
        let queues = GreedySelector.assign(&state.graph, items, &demand, &starts);
        assert_eq!(queues[0].len(), 1, "corridor should collapse to one item");

        let mut tactical = TacticalCoordinator::new(1);
        tactical.enqueue(queues).unwrap();

        for _ in 0..40 {
            let state = sim.read();
            let actions = tactical.decide(&state);
            if actions.is_empty() && tactical.idle() {
                break;
            }
            sim.update(&actions);
        }
        let stats = sim.stats();
        assert_eq!(stats.rescued, 3, "all three incapables delivered");
        assert_eq!(stats.remaining, 0);
    }

    #[test]
    fn trapped_responder_surrenders_queue() {
        let config = corridor_config();
        let mut sim = SimulationBuilder::new(&config, 1, 42).build().unwrap();
        let state = sim.read();
        let demand: BTreeMap<VertexId, u32> = state
            .graph
            .vertex_ids()
            .filter(|&v| state.graph.vertex(v).kind.is_room() && !state.graph.vertex(v).burned)
            .map(|v| (v, 1))
            .collect();
        let items = Optimizer::new(3).generate(&state.graph, state.fire_origin, &demand);
        let starts = vec![SelectorStart {
            position: state.responders[0].position,
            busy_time: 0.0,
            available: true,
        }];
        let mut tactical = TacticalCoordinator::new(1);
        tactical
            .enqueue(GreedySelector.assign(&state.graph, items, &demand, &starts))
            .unwrap();

        // One tick: the responder steps into r0 and lifts its occupant.
        let state = sim.read();
        let actions = tactical.decide(&state);
        sim.update(&actions);

        // Edge loss through kernel physics is stochastic; emulate the
        // post-burn world directly on a snapshot instead.
        let mut cut_state = sim.read();
        let pos = cut_state.responders[0].position;
        for e in cut_state.graph.incident_edges(pos).to_vec() {
            cut_state.graph.clear_edge(e);
        }

        let affected = tactical.collect_affected(&cut_state);
        assert!(tactical.is_trapped(0));
        assert!(tactical.idle(), "queue drained into the affected vector");
        // r0's occupant was already lifted; r1 and r2 are surrendered.
        assert_eq!(affected.values().sum::<u32>(), 2);
        // Trapped responders emit nothing.
        assert!(tactical.decide(&cut_state).is_empty());
    }
}
