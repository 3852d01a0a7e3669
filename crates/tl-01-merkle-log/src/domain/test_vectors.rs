//! Known-answer vectors for the SHA-256 tree (shared by unit tests).

use super::hasher::{MerkleHash, MerkleHasher};

pub const LEAVES: [&str; 8] = [
    "",
    "00",
    "10",
    "2021",
    "3031",
    "40414243",
    "5051525354555657",
    "606162636465666768696a6b6c6d6e6f",
];

/// Expected roots for the first 1..=8 leaves.
pub const ROOTS: [&str; 8] = [
    "6E340B9CFFB37A989CA544E6BB780A2C78901D3FB33738768511A30617AFA01D",
    "FAC54203E7CC696CF0DFCB42C92A1D9DBAF70AD9E621F4BD8D98662F00E3C125",
    "AEB6BCFE274B70A14FB067A5E5578264DB0FA9B51AF5E0BA159158F329E06E77",
    "D37EE418976DD95753C1C73862B9398FA2A2CF9B4FF0FDFE8B30CD95209614B7",
    "4E3BBB1F7B478DCFE71FB631631519A3BCA12C9AEFCA1612BFCE4C13A86264D4",
    "76E67DADBCDF1E10E1B74DDC608ABD2F98DFB16FBCE75277B5232A127F2087EF",
    "DDB89BE403809E325750D3D263CD78929C2942B7942A34B77E122C9594A74C8C",
    "5DC9DA79A70659A9AD559CB701DED9A2AB9D823AAD2F4960CFE370EFF4604328",
];

pub fn hash(hex_str: &str) -> MerkleHash {
    MerkleHash::from_hex(hex_str).unwrap()
}

pub fn leaf_data(index: usize) -> Vec<u8> {
    hex::decode(LEAVES[index]).unwrap()
}

pub fn vector_leaf_hashes() -> Vec<MerkleHash> {
    let hasher = MerkleHasher::default();
    (0..LEAVES.len())
        .map(|i| hasher.hash_leaf(&leaf_data(i)))
        .collect()
}

/// `(leaf_index, tree_size, path)`
pub fn inclusion_vectors() -> Vec<(u64, u64, Vec<MerkleHash>)> {
    vec![
        (0, 1, vec![]),
        (
            0,
            8,
            vec![
                hash("96A296D224F285C67BEE93C30F8A309157F0DAA35DC5B87E410B78630A09CFC7"),
                hash("5F083F0A1A33CA076A95279832580DB3E0EF4584BDFF1F54C8A360F50DE3031E"),
                hash("6B47AAF29EE3C2AF9AF889BC1FB9254DABD31177F16232DD6AAB035CA39BF6E4"),
            ],
        ),
        (
            5,
            8,
            vec![
                hash("BC1A0643B12E4D2D7C77918F44E0F4F79A838B6CF9EC5B5C283E1F4D88599E6B"),
                hash("CA854EA128ED050B41B35FFC1B87B8EB2BDE461E9E3B5596ECE6B9D5975A0AE0"),
                hash("D37EE418976DD95753C1C73862B9398FA2A2CF9B4FF0FDFE8B30CD95209614B7"),
            ],
        ),
        (
            2,
            3,
            vec![hash(
                "FAC54203E7CC696CF0DFCB42C92A1D9DBAF70AD9E621F4BD8D98662F00E3C125",
            )],
        ),
        (
            1,
            5,
            vec![
                hash("6E340B9CFFB37A989CA544E6BB780A2C78901D3FB33738768511A30617AFA01D"),
                hash("5F083F0A1A33CA076A95279832580DB3E0EF4584BDFF1F54C8A360F50DE3031E"),
                hash("BC1A0643B12E4D2D7C77918F44E0F4F79A838B6CF9EC5B5C283E1F4D88599E6B"),
            ],
        ),
    ]
}

/// `(tree_size1, tree_size2, proof)`
pub fn consistency_vectors() -> Vec<(u64, u64, Vec<MerkleHash>)> {
    vec![
        (1, 1, vec![]),
        (
            1,
            8,
            vec![
                hash("96A296D224F285C67BEE93C30F8A309157F0DAA35DC5B87E410B78630A09CFC7"),
                hash("5F083F0A1A33CA076A95279832580DB3E0EF4584BDFF1F54C8A360F50DE3031E"),
                hash("6B47AAF29EE3C2AF9AF889BC1FB9254DABD31177F16232DD6AAB035CA39BF6E4"),
            ],
        ),
        (
            6,
            8,
            vec![
                hash("0EBC5D3437FBE2DB158B9F126A1D118E308181031D0A949F8DEDEDEBC558EF6A"),
                hash("CA854EA128ED050B41B35FFC1B87B8EB2BDE461E9E3B5596ECE6B9D5975A0AE0"),
                hash("D37EE418976DD95753C1C73862B9398FA2A2CF9B4FF0FDFE8B30CD95209614B7"),
            ],
        ),
        (
            2,
            5,
            vec![
                hash("5F083F0A1A33CA076A95279832580DB3E0EF4584BDFF1F54C8A360F50DE3031E"),
                hash("BC1A0643B12E4D2D7C77918F44E0F4F79A838B6CF9EC5B5C283E1F4D88599E6B"),
            ],
        ),
    ]
}
