use crate::params::NUM_CLUSTER;

bitflags::bitflags! {
    /// One-hot mask of clusters consuming a PE's output.
    ///
    /// Bit `k` set means cluster `k` reads the value over the inter-cluster
    /// network. Same-cluster fanout rides the local bypass and never appears
    /// here, so a PE's own cluster bit is always clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClusterMask: u8 {
        /// Cluster 0 consumes the output.
        const CLUSTER_0 = 0b0001;
        /// Cluster 1 consumes the output.
        const CLUSTER_1 = 0b0010;
        /// Cluster 2 consumes the output.
        const CLUSTER_2 = 0b0100;
        /// Cluster 3 consumes the output.
        const CLUSTER_3 = 0b1000;
    }
}

impl ClusterMask {
    /// Mask with only the bit for `cluster` set.
    pub fn cluster(cluster: usize) -> Self {
        debug_assert!(cluster < NUM_CLUSTER);
        Self::from_bits_truncate(1 << cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_bit_per_cluster() {
        assert_eq!(ClusterMask::cluster(0), ClusterMask::CLUSTER_0);
        assert_eq!(ClusterMask::cluster(1), ClusterMask::CLUSTER_1);
        assert_eq!(ClusterMask::cluster(2), ClusterMask::CLUSTER_2);
        assert_eq!(ClusterMask::cluster(3), ClusterMask::CLUSTER_3);
    }

    #[test]
    fn union_accumulates_consumers() {
        let mask = ClusterMask::cluster(1) | ClusterMask::cluster(3) | ClusterMask::cluster(1);
        assert_eq!(mask.bits(), 0b1010);
    }
}
