use crate::planner::PlanError;

pub type Node = u32;
pub type Time = u32;

/// Facing of an agent in the rotation-aware variant. The numeric codes are
/// part of the public contract and match the order in which neighbors are
/// enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    East = 0,
    West = 1,
    South = 2,
    North = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    pub fn code(self) -> usize {
        self as usize
    }

    pub fn from_code(code: usize) -> Option<Direction> {
        Direction::ALL.get(code).copied()
    }

    /// Unit step in grid coordinates; y grows southwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
            Direction::North => (0, -1),
        }
    }

    /// The facing required to step from `from` onto the 4-adjacent `to`.
    pub fn between(from: (i32, i32), to: (i32, i32)) -> Option<Direction> {
        let step = (to.0 - from.0, to.1 - from.1);
        Direction::ALL.iter().copied().find(|d| d.delta() == step)
    }

    /// The two facings reachable by a single 90° rotation.
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::East | Direction::West => [Direction::South, Direction::North],
            Direction::South | Direction::North => [Direction::East, Direction::West],
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::South => Direction::North,
            Direction::North => Direction::South,
        }
    }
}

/// Maps the passable cells of a rectangular grid to dense ids in row-major
/// order and precomputes the 4-connected adjacency between them.
///
/// A cell value of 0 is passable, anything else is blocked. Coordinates are
/// (x, y) with x indexing columns and y indexing rows.
#[derive(Clone)]
pub struct GridGraph {
    width: i32,
    height: i32,
    id_map: Vec<Option<Node>>,
    coords: Vec<(i32, i32)>,
    neighbors: Vec<Vec<Node>>,
}

impl GridGraph {
    pub fn from_cells(cells: &[Vec<i32>]) -> Result<Self, PlanError> {
        let height = cells.len() as i32;
        let width = if height > 0 { cells[0].len() as i32 } else { 0 };

        let mut id_map = vec![None; (width * height) as usize];
        let mut coords = Vec::new();
        for (y, row) in cells.iter().enumerate() {
            if row.len() as i32 != width {
                return Err(PlanError::RaggedGrid {
                    row: y,
                    expected: width as usize,
                    found: row.len(),
                });
            }
            for (x, &value) in row.iter().enumerate() {
                if value == 0 {
                    id_map[y * width as usize + x] = Some(coords.len() as Node);
                    coords.push((x as i32, y as i32));
                }
            }
        }

        let mut neighbors = vec![Vec::new(); coords.len()];
        for (u, &(x, y)) in coords.iter().enumerate() {
            for dir in Direction::ALL {
                let (dx, dy) = dir.delta();
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width || ny >= height {
                    continue;
                }
                if let Some(v) = id_map[(ny * width + nx) as usize] {
                    neighbors[u].push(v);
                }
            }
        }

        Ok(Self {
            width,
            height,
            id_map,
            coords,
            neighbors,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of passable cells.
    pub fn node_count(&self) -> usize {
        self.coords.len()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Id of the passable cell at (x, y); None if out of bounds or blocked.
    pub fn id(&self, x: i32, y: i32) -> Option<Node> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.id_map[(y * self.width + x) as usize]
    }

    /// Coordinates of a cell id.
    /// ** Panics if id >= node_count **
    pub fn xy(&self, id: Node) -> (i32, i32) {
        self.coords[id as usize]
    }

    /// Passable 4-neighbors of a cell, in E, W, S, N order.
    /// ** Panics if id >= node_count **
    pub fn neighbors(&self, id: Node) -> &[Node] {
        &self.neighbors[id as usize]
    }

    /// All undirected grid edges {a, b} as pairs with a < b, sorted by a.
    pub fn undirected_edges(&self) -> Vec<(Node, Node)> {
        let mut edges = Vec::with_capacity(self.node_count() * 2);
        for u in 0..self.node_count() as Node {
            for &v in self.neighbors(u) {
                if u < v {
                    edges.push((u, v));
                }
            }
        }
        edges
    }
}
