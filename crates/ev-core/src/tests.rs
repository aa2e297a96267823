//! Unit tests for ev-core primitives.

#[cfg(test)]
mod ids {
    use crate::{EdgeId, ResponderId, VertexId};

    #[test]
    fn index_roundtrip() {
        let id = VertexId::from_index(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id, VertexId(42));
    }

    #[test]
    fn ordering() {
        assert!(ResponderId(0) < ResponderId(1));
        assert!(VertexId(100) > VertexId(99));
    }

    #[test]
    fn none_marker_is_top_slot() {
        assert_eq!(VertexId::NONE.0, u32::MAX);
        assert!(!VertexId::NONE.is_valid());
        assert!(EdgeId(0).is_valid());
        assert!(!ResponderId::NONE.is_valid());
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(VertexId(3).to_string(), "v3");
        assert_eq!(EdgeId(12).to_string(), "e12");
        assert_eq!(ResponderId(7).to_string(), "ff7");
        assert_eq!(VertexId::NONE.to_string(), "v-");
    }
}

#[cfg(test)]
mod time {
    use crate::Tick;

    #[test]
    fn tick_arithmetic() {
        let t = Tick(10);
        assert_eq!(t + 5, Tick(15));
        assert_eq!(t.offset(3), Tick(13));
        assert_eq!(Tick(15) - Tick(10), 5u64);
        assert_eq!(Tick(15).since(Tick(10)), 5);
    }

    #[test]
    fn minutes_at_one_second_ticks() {
        assert_eq!(Tick(0).minutes(), 0.0);
        assert_eq!(Tick(120).minutes(), 2.0);
    }

    #[test]
    fn display() {
        assert_eq!(Tick(31).to_string(), "T31");
    }
}

#[cfg(test)]
mod rng {
    use crate::SimRng;

    #[test]
    fn deterministic_same_seed() {
        let mut r1 = SimRng::new(12345);
        let mut r2 = SimRng::new(12345);
        for _ in 0..100 {
            let a: f32 = r1.random();
            let b: f32 = r2.random();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn children_diverge() {
        let mut root_a = SimRng::new(1);
        let mut root_b = SimRng::new(1);
        let mut c0 = root_a.child(0);
        let mut c1 = root_b.child(1);
        let a: u64 = c0.random();
        let b: u64 = c1.random();
        assert_ne!(a, b, "children with different offsets should diverge");
    }

    #[test]
    fn gen_range_in_bounds() {
        let mut rng = SimRng::new(0);
        for _ in 0..1000 {
            let v = rng.gen_range(0.0f32..1.0);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = SimRng::new(0);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }
}

#[cfg(test)]
mod phase {
    use crate::Phase;

    #[test]
    fn default_is_sweep() {
        assert!(Phase::default().is_sweep());
        assert!(!Phase::default().is_rescue());
    }

    #[test]
    fn display() {
        assert_eq!(Phase::Sweep.to_string(), "sweep");
        assert_eq!(Phase::Rescue.to_string(), "rescue");
    }
}
