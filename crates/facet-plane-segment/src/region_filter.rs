use crate::morphology::close;
use crate::{Mask, Region};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Shape heuristics for [`RegionFilter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionFilterParams {
    /// Largest pixel count a single facet may have.
    pub max_region_area: usize,
    /// Facets must fill strictly more than this share of their bounding box.
    pub min_extent: f64,
    /// Bounding-box aspect ratio must be strictly within `1 ± max_aspect_deviation`.
    pub max_aspect_deviation: f64,
    /// Euclidean radius of the closing that merges neighbouring facets.
    pub closing_radius: u8,
    /// Smallest accepted area of the merged cluster.
    pub min_cluster_area: usize,
}

impl Default for RegionFilterParams {
    fn default() -> Self {
        Self {
            max_region_area: 10_000,
            min_extent: 0.5,
            max_aspect_deviation: 0.3,
            closing_radius: 7,
            min_cluster_area: 1500,
        }
    }
}

impl RegionFilterParams {
    /// Whether a single region looks like a facet.
    pub fn accepts(&self, region: &Region) -> bool {
        region.area <= self.max_region_area
            && region.extent() > self.min_extent
            && (region.aspect_ratio() - 1.0).abs() < self.max_aspect_deviation
    }
}

/// Largest 8-connected component of `mask` together with its area.
///
/// Equal areas resolve to the component met first in raster order.
pub fn largest_component(mask: &Mask) -> Option<(Mask, usize)> {
    let labels = mask.label();
    let mut best: Option<Region> = None;
    for region in labels.regions() {
        if best.is_none_or(|b| region.area > b.area) {
            best = Some(region);
        }
    }
    let best = best?;
    Some((labels.select(|l| l == best.label), best.area))
}

/// Candidate mask to a single consolidated facet cluster.
#[derive(Clone, Debug, Default)]
pub struct RegionFilter {
    params: RegionFilterParams,
}

impl RegionFilter {
    pub fn new(params: RegionFilterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RegionFilterParams {
        &self.params
    }

    /// Union of every region passing [`RegionFilterParams::accepts`], or
    /// `None` if no region passes.
    pub fn consolidate(&self, mask: &Mask) -> Option<Mask> {
        let labels = mask.label();
        let regions = labels.regions();
        let kept: Vec<u32> = regions
            .iter()
            .filter(|r| self.params.accepts(r))
            .map(|r| r.label)
            .collect();
        debug!("region filter: kept {}/{} regions", kept.len(), regions.len());
        if kept.is_empty() {
            return None;
        }
        Some(labels.select(|l| kept.contains(&l)))
    }

    /// Close the consolidated mask and keep its largest component if it is
    /// big enough.
    pub fn largest_cluster(&self, consolidated: &Mask) -> Option<Mask> {
        let closed = close(consolidated, self.params.closing_radius);
        let (cluster, area) = largest_component(&closed)?;
        if area < self.params.min_cluster_area {
            warn!(
                "largest cluster has {} px, below the minimum of {}",
                area, self.params.min_cluster_area
            );
            return None;
        }
        debug!("region filter: cluster of {} px", area);
        Some(cluster)
    }

    /// Full filtering step; `None` means no facet cluster in this frame.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, mask)))]
    pub fn filter(&self, mask: &Mask) -> Option<Mask> {
        let consolidated = self.consolidate(mask)?;
        self.largest_cluster(&consolidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(rows: usize, cols: usize, area: usize) -> Region {
        Region {
            label: 1,
            area,
            min_row: 10,
            max_row: 10 + rows - 1,
            min_col: 20,
            max_col: 20 + cols - 1,
        }
    }

    fn paint(mask: &mut Mask, r0: usize, c0: usize, rows: usize, cols: usize) {
        for r in r0..r0 + rows {
            for c in c0..c0 + cols {
                mask.set(r, c, true);
            }
        }
    }

    /// 3x3 grid of 20x20 facets separated by 4 px gaps.
    fn facet_grid() -> Mask {
        let mut mask = Mask::new(120, 120);
        for i in 0..3 {
            for j in 0..3 {
                paint(&mut mask, 20 + i * 24, 20 + j * 24, 20, 20);
            }
        }
        mask
    }

    #[test]
    fn accepts_a_square() {
        assert!(RegionFilterParams::default().accepts(&region(20, 20, 400)));
    }

    #[test]
    fn extent_boundary_is_excluded() {
        let params = RegionFilterParams::default();
        assert!(!params.accepts(&region(10, 10, 50)));
        assert!(params.accepts(&region(10, 10, 51)));
    }

    #[test]
    fn aspect_boundary_is_excluded() {
        let params = RegionFilterParams {
            max_aspect_deviation: 0.25,
            ..RegionFilterParams::default()
        };
        assert!(!params.accepts(&region(5, 4, 20)));
        assert!(!params.accepts(&region(3, 4, 12)));
        assert!(params.accepts(&region(9, 8, 72)));

        // 13/10 - 1 lands just above 0.3 in f64; no integer box hits 0.3 exactly.
        let defaults = RegionFilterParams::default();
        assert!(!defaults.accepts(&region(13, 10, 130)));
        assert!(defaults.accepts(&region(12, 10, 120)));
    }

    #[test]
    fn aspect_deviation_equal_to_the_bound_is_rejected() {
        for (rows, cols) in [(5, 4), (13, 10), (7, 10), (3, 2)] {
            let r = region(rows, cols, rows * cols);
            let exact = RegionFilterParams {
                max_aspect_deviation: (r.aspect_ratio() - 1.0).abs(),
                ..RegionFilterParams::default()
            };
            assert!(!exact.accepts(&r), "{rows}x{cols}");

            let wider = RegionFilterParams {
                max_aspect_deviation: exact.max_aspect_deviation + 1e-9,
                ..exact
            };
            assert!(wider.accepts(&r), "{rows}x{cols}");
        }
    }

    #[test]
    fn oversized_region_is_rejected() {
        let params = RegionFilterParams::default();
        assert!(params.accepts(&region(100, 100, 10_000)));
        assert!(!params.accepts(&region(101, 100, 10_001)));
    }

    #[test]
    fn elongated_regions_do_not_survive() {
        let mut mask = Mask::new(100, 100);
        paint(&mut mask, 10, 10, 5, 60);
        paint(&mut mask, 30, 80, 50, 6);
        assert!(RegionFilter::default().consolidate(&mask).is_none());
        assert!(RegionFilter::default().filter(&mask).is_none());
    }

    #[test]
    fn facet_grid_merges_into_one_cluster() {
        let mut mask = facet_grid();
        paint(&mut mask, 5, 100, 4, 15);
        let cluster = RegionFilter::default().filter(&mask).expect("cluster");
        let regions = cluster.label().regions();
        assert_eq!(regions.len(), 1);
        assert!(regions[0].area >= 9 * 400);
        assert!(cluster.get(42, 42));
        assert!(!cluster.get(6, 105));
    }

    #[test]
    fn small_cluster_is_not_found() {
        let mut mask = Mask::new(60, 60);
        paint(&mut mask, 20, 20, 20, 20);
        assert!(RegionFilter::default().filter(&mask).is_none());

        let relaxed = RegionFilter::new(RegionFilterParams {
            min_cluster_area: 400,
            ..RegionFilterParams::default()
        });
        let cluster = relaxed.filter(&mask).expect("cluster");
        assert_eq!(cluster.count(), 400);
    }

    #[test]
    fn single_mid_sized_facet_passes_the_default_cluster_area() {
        let mut mask = Mask::new(80, 80);
        paint(&mut mask, 18, 18, 44, 44);
        let cluster = RegionFilter::default().filter(&mask).expect("cluster");
        assert_eq!(cluster.count(), 44 * 44);

        let mut small = Mask::new(80, 80);
        paint(&mut small, 20, 20, 38, 38);
        assert!(RegionFilter::default().filter(&small).is_none());
    }

    #[test]
    fn largest_component_breaks_ties_in_raster_order() {
        let mut mask = Mask::new(40, 40);
        paint(&mut mask, 25, 2, 5, 5);
        paint(&mut mask, 3, 30, 5, 5);
        let (largest, area) = largest_component(&mask).expect("component");
        assert_eq!(area, 25);
        assert!(largest.get(3, 30));
        assert!(!largest.get(25, 2));

        assert!(largest_component(&Mask::new(5, 5)).is_none());
    }

    #[test]
    fn removing_a_region_never_grows_the_cluster() {
        let filter = RegionFilter::default();
        let consolidated = facet_grid();
        let full = largest_component(&close(&consolidated, filter.params().closing_radius))
            .map_or(0, |(_, area)| area);

        let labels = consolidated.label();
        for region in labels.regions() {
            let reduced = labels.select(|l| l != region.label);
            let area = largest_component(&close(&reduced, filter.params().closing_radius))
                .map_or(0, |(_, area)| area);
            assert!(area <= full, "{area} > {full}");
        }
    }
}
