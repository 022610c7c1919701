use super::orientation::AspectBucket;
use super::ImageRef;
use crate::error::Result;
use crate::progress::Reporter;

/// Progress of one stage, mapped onto a slice of the overall run
pub struct BatchProgress<'a> {
    reporter: &'a Reporter,
    start: f32,
    end: f32,
    total: usize,
}

impl<'a> BatchProgress<'a> {
    /// `start..end` is the share of the whole run this stage covers
    pub fn new(reporter: &'a Reporter, start: f32, end: f32, total: usize) -> Self {
        Self {
            reporter,
            start,
            end: end.max(start),
            total,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        self.reporter
    }

    /// Overall fraction once `completed` items of this stage are done
    pub fn fraction(&self, completed: usize) -> f32 {
        if self.total == 0 {
            return self.end;
        }
        let share = completed.min(self.total) as f32 / self.total as f32;
        self.start + share * (self.end - self.start)
    }

    /// Report that item `index` is being worked on
    pub fn advance(&self, index: usize, item: &str) {
        self.reporter.progress(self.fraction(index), item);
    }

    pub fn finish(&self) {
        self.reporter.progress(self.end, "");
    }
}

/// Images split by aspect ratio; each image lands in exactly one bucket
#[derive(Debug, Default)]
pub struct RatioBuckets {
    pub landscape: Vec<ImageRef>,
    pub portrait: Vec<ImageRef>,
    pub other: Vec<ImageRef>,
    /// Images whose dimensions could not be read, with the reason
    pub unreadable: Vec<(ImageRef, String)>,
}

impl RatioBuckets {
    /// Non-empty buckets in output order
    pub fn into_non_empty(self) -> Vec<(AspectBucket, Vec<ImageRef>)> {
        AspectBucket::SPLIT
            .into_iter()
            .zip([self.landscape, self.portrait, self.other])
            .filter(|(_, images)| !images.is_empty())
        .collect()
    }
}

/// Group images by aspect ratio, keeping input order within each bucket
pub fn group_by_aspect(
    images: Vec<ImageRef>,
    progress: &BatchProgress,
    classify_fn: impl Fn(&ImageRef) -> Result<AspectBucket>,
) -> RatioBuckets {
    let mut buckets = RatioBuckets::default();

    for (index, image) in images.into_iter().enumerate() {
        let name = image.file_name();
        progress.advance(index, &name);

        match classify_fn(&image) {
            Ok(bucket) => {
                progress
                    .reporter()
                    .info(format!("{}: {}", name, bucket.description()));
                match bucket {
                    AspectBucket::Landscape => buckets.landscape.push(image),
                    AspectBucket::Portrait => buckets.portrait.push(image),
                    AspectBucket::Other | AspectBucket::All => buckets.other.push(image),
                }
            }
            Err(e) => {
                progress
                    .reporter()
                    .warn(format!("Could not classify {}: {}", name, e));
                buckets.unreadable.push((image, e.to_string()));
            }
        }
    }

    progress.finish();
    buckets
}
