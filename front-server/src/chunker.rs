//! Shard arithmetic for splitting an upload into contiguous byte ranges.

use std::sync::Arc;

use crate::registry::ChunkServer;

/// Shard sizes are aligned down to a multiple of this many bytes.
const WORD_SIZE: i64 = 8;

/// Size of every shard but the last, aligned down to the word size.
pub fn chunk_size(file_size: i64, num_parts: usize) -> i64 {
    let part_size = file_size / num_parts as i64;

    (part_size / WORD_SIZE) * WORD_SIZE
}

/// Absolute start offsets of all shards.
pub fn chunk_offsets(file_size: i64, num_parts: usize) -> Vec<i64> {
    let size = chunk_size(file_size, num_parts);
    let mut offsets = vec![0i64; num_parts];
    for i in 1..num_parts {
        offsets[i] = offsets[i - 1] + size;
    }
    offsets
}

/// Size of shard `i`. The last shard runs to the end of the file,
/// absorbing the unaligned tail.
pub fn chunk_size_at(file_size: i64, offsets: &[i64], i: usize) -> i64 {
    if i != offsets.len() - 1 {
        offsets[i + 1] - offsets[i]
    } else {
        file_size - offsets[i]
    }
}

/// One shard of an upload plan.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub start_offset: i64,
    pub size: i64,
    pub server: Arc<ChunkServer>,
}

/// Builds the per-shard plan pairing each byte range with its target
/// server.
pub fn build_chunks(
    file_size: i64,
    offsets: &[i64],
    servers: &[Arc<ChunkServer>],
) -> Vec<Chunk> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, &start_offset)| Chunk {
            index: i,
            start_offset,
            size: chunk_size_at(file_size, offsets, i),
            server: Arc::clone(&servers[i]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size() {
        let cases = [
            (1000, 4, 248),
            (1000, 5, 200),
            (1024, 4, 256),
            (1024, 5, 200),
            (1024, 3, 336),
            (1024, 1, 1024),
            (0, 1, 0),
            (100, 3, 32),
            (100, 7, 8),
        ];
        for (file_size, num_parts, expected) in cases {
            assert_eq!(
                chunk_size(file_size, num_parts),
                expected,
                "chunk_size({file_size}, {num_parts})"
            );
        }
    }

    #[test]
    fn test_chunk_offsets() {
        let cases: [(i64, usize, &[i64]); 9] = [
            (1000, 4, &[0, 248, 496, 744]),
            (1000, 5, &[0, 200, 400, 600, 800]),
            (1024, 4, &[0, 256, 512, 768]),
            (1024, 5, &[0, 200, 400, 600, 800]),
            (1024, 3, &[0, 336, 672]),
            (1024, 1, &[0]),
            (0, 1, &[0]),
            (100, 3, &[0, 32, 64]),
            (100, 7, &[0, 8, 16, 24, 32, 40, 48]),
        ];
        for (file_size, num_parts, expected) in cases {
            assert_eq!(
                chunk_offsets(file_size, num_parts),
                expected,
                "chunk_offsets({file_size}, {num_parts})"
            );
        }
    }

    #[test]
    fn test_last_shard_absorbs_tail() {
        let offsets = chunk_offsets(1000, 4);
        let sizes: Vec<i64> = (0..4).map(|i| chunk_size_at(1000, &offsets, i)).collect();
        assert_eq!(sizes, [248, 248, 248, 256]);
    }

    #[test]
    fn test_sizes_conserve_file_size() {
        for file_size in [0i64, 1, 7, 8, 9, 100, 999, 1000, 1024, 65537] {
            for num_parts in 1..=8 {
                let offsets = chunk_offsets(file_size, num_parts);
                let sizes: Vec<i64> = (0..num_parts)
                    .map(|i| chunk_size_at(file_size, &offsets, i))
                    .collect();

                assert_eq!(
                    sizes.iter().sum::<i64>(),
                    file_size,
                    "sum of shard sizes for {file_size}/{num_parts}"
                );
                for size in &sizes[..num_parts - 1] {
                    assert_eq!(size % 8, 0, "alignment for {file_size}/{num_parts}");
                }
                assert_eq!(offsets[0], 0);
                for pair in offsets.windows(2) {
                    assert!(pair[0] <= pair[1]);
                }
            }
        }
    }

    #[test]
    fn test_zero_size_file() {
        let offsets = chunk_offsets(0, 6);
        assert_eq!(offsets, [0, 0, 0, 0, 0, 0]);
        for i in 0..6 {
            assert_eq!(chunk_size_at(0, &offsets, i), 0);
        }
    }
}
