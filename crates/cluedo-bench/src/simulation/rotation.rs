/// Deterministic seat assignments: rotation `r` puts agent `(seat + r) % n` in
/// each seat, so every agent takes every turn order once a full cycle is run.
pub struct SeatRotations {
    rotations: Vec<Vec<usize>>,
}

impl SeatRotations {
    pub fn new(agents: usize, count: usize) -> Self {
        let limit = count.min(agents);
        let rotations = (0..limit)
            .map(|offset| (0..agents).map(|seat| (seat + offset) % agents).collect())
            .collect();
        Self { rotations }
    }

    pub fn as_slice(&self) -> &[Vec<usize>] {
        &self.rotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_rotation_is_identity() {
        let rotations = SeatRotations::new(3, 1);
        assert_eq!(rotations.as_slice(), &[vec![0, 1, 2]]);
    }

    #[test]
    fn every_agent_visits_every_seat() {
        let rotations = SeatRotations::new(4, 4);
        for seat in 0..4 {
            let mut agents: Vec<_> = rotations.as_slice().iter().map(|r| r[seat]).collect();
            agents.sort();
            assert_eq!(agents, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn caps_at_agent_count() {
        let rotations = SeatRotations::new(3, 10);
        assert_eq!(rotations.as_slice().len(), 3);
    }
}
