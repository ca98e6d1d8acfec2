pub(crate) const MIN_BATCH_SIZE: u32 = 1;
pub(crate) const MAX_BATCH_SIZE: u32 = 64;
pub(crate) const MIN_EPOCHS: u32 = 1;
pub(crate) const MIN_SAMPLES_PER_CLASS: u32 = 100;
pub(crate) const MIN_PATCH_SIZE: u32 = 32;

pub(crate) fn default_batch_size() -> u32 {
    16
}

pub(crate) fn default_epochs() -> u32 {
    15
}

pub(crate) fn default_max_samples_per_class() -> u32 {
    2_000
}

pub(crate) fn default_patch_size() -> u32 {
    256
}

pub(crate) fn default_log_filter() -> String {
    "info".to_string()
}
