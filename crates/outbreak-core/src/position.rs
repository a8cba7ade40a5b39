use serde::{Deserialize, Serialize};

/// A point in a level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Parse the `"x,y,z"` form used by arena files.
    pub fn parse(s: &str) -> Option<Vec3> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
        let x = parts.next()?.ok()?;
        let y = parts.next()?.ok()?;
        let z = parts.next()?.ok()?;
        if parts.next().is_some() || !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }
        Some(Vec3 { x, y, z })
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Where the host should put a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    /// A spawn point inside an arena level.
    ArenaSpawn { level: String, position: Vec3 },
    /// The host's default world spawn, outside every arena.
    ServerLobby,
}

/// A block in a named level; used for the join sign and storage containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRef {
    pub level: String,
    pub position: Vec3,
}

impl BlockRef {
    /// Block coordinates compare on the integer grid.
    pub fn same_block(&self, level: &str, position: &Vec3) -> bool {
        self.level == level
            && self.position.x.floor() == position.x.floor()
            && self.position.y.floor() == position.y.floor()
            && self.position.z.floor() == position.z.floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_triplet() {
        assert_eq!(Vec3::parse("1,64,-3"), Some(Vec3::new(1.0, 64.0, -3.0)));
    }

    #[test]
    fn parse_tolerates_whitespace_and_floats() {
        assert_eq!(
            Vec3::parse(" 0.5 , 70 ,2.25"),
            Some(Vec3::new(0.5, 70.0, 2.25))
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(Vec3::parse(""), None);
        assert_eq!(Vec3::parse("1,2"), None);
        assert_eq!(Vec3::parse("1,2,3,4"), None);
        assert_eq!(Vec3::parse("a,b,c"), None);
        assert_eq!(Vec3::parse("NaN,0,0"), None);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let v = Vec3::new(10.5, 65.0, -7.0);
        assert_eq!(Vec3::parse(&v.to_string()), Some(v));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn same_block_ignores_sub_block_offset() {
        let sign = BlockRef {
            level: "hub".to_string(),
            position: Vec3::new(10.0, 64.0, 10.0),
        };
        assert!(sign.same_block("hub", &Vec3::new(10.7, 64.2, 10.9)));
        assert!(!sign.same_block("hub", &Vec3::new(11.0, 64.0, 10.0)));
        assert!(!sign.same_block("other", &Vec3::new(10.0, 64.0, 10.0)));
    }
}
