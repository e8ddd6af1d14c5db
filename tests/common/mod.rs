use nalgebra::Vector3;
use sqs_engine::core::composition::Sublattice;
use sqs_engine::core::lattice::Lattice;
use sqs_engine::core::structure::Structure;
use sqs_engine::Composition;

/// Single-species FCC aluminium: four sites, one possible arrangement.
pub fn fcc_al() -> Structure {
    Structure::new(cubic_fcc_lattice(), fcc_frac_coords(), vec![13, 13, 13, 13])
}

/// FCC cell with a 2 Al / 2 Zn interact-mode composition.
pub fn fcc_al_zn() -> (Structure, Composition) {
    let structure = Structure::new(cubic_fcc_lattice(), fcc_frac_coords(), vec![13, 13, 13, 13]);
    let composition = Composition(vec![Sublattice {
        sites: vec![0, 1, 2, 3],
        counts: [(13u8, 2usize), (30u8, 2usize)].into_iter().collect(),
    }]);
    (structure, composition)
}

/// BCC Fe/Cr: a 2x2x2 cubic arrangement of 8 sites, half iron half chromium.
pub fn bcc_fe_cr() -> (Structure, Composition) {
    let lattice = Lattice::new(
        Vector3::new(2.0, 0.0, 0.0),
        Vector3::new(0.0, 2.0, 0.0),
        Vector3::new(0.0, 0.0, 2.0),
        [true, true, true],
    )
    .unwrap();
    let mut frac_coords = Vec::new();
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..2 {
                frac_coords.push(Vector3::new(i as f64 * 0.5, j as f64 * 0.5, k as f64 * 0.5));
            }
        }
    }
    let n = frac_coords.len();
    let structure = Structure::new(lattice, frac_coords, vec![26; n]);
    let composition = Composition(vec![Sublattice {
        sites: (0..n).collect(),
        counts: [(26u8, n / 2), (24u8, n - n / 2)].into_iter().collect(),
    }]);
    (structure, composition)
}

/// Rock-salt NaCl-like cell: two independent sublattices, each a single
/// species pair, so split mode has a small but nontrivial multiset per side.
pub fn rock_salt_nacl() -> (Structure, Composition) {
    let lattice = Lattice::new(
        Vector3::new(2.0, 0.0, 0.0),
        Vector3::new(0.0, 2.0, 0.0),
        Vector3::new(0.0, 0.0, 2.0),
        [true, true, true],
    )
    .unwrap();
    let frac_coords = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.5, 0.5, 0.0),
        Vector3::new(0.5, 0.0, 0.5),
        Vector3::new(0.0, 0.5, 0.5),
    ];
    let species = vec![11, 11, 17, 17];
    let structure = Structure::new(lattice, frac_coords, species);
    let composition = Composition(vec![
        Sublattice {
            sites: vec![0, 1],
            counts: [(11u8, 1usize), (3u8, 1usize)].into_iter().collect(),
        },
        Sublattice {
            sites: vec![2, 3],
            counts: [(17u8, 1usize), (9u8, 1usize)].into_iter().collect(),
        },
    ]);
    (structure, composition)
}

fn cubic_fcc_lattice() -> Lattice {
    Lattice::new(
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        [true, true, true],
    )
    .unwrap()
}

fn fcc_frac_coords() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 0.5, 0.5),
        Vector3::new(0.5, 0.0, 0.5),
        Vector3::new(0.5, 0.5, 0.0),
    ]
}
