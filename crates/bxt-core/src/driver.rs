use crate::sandbox::Sandbox;

pub const DRIVER_DOCKER: &str = "docker";
pub const DRIVER_DOCKER_CONTAINER: &str = "docker-container";

const FEATURE_DELIMITER: char = '+';

/// Driver kind decoded from a sandbox name.
///
/// Anything after the first `+` is a feature token; it is only recorded as
/// present, never decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverName<'a> {
    pub kind: &'a str,
    pub has_feature: bool,
}

impl<'a> DriverName<'a> {
    #[must_use]
    pub fn parse(name: &'a str) -> Self {
        match name.split_once(FEATURE_DELIMITER) {
            Some((kind, _)) => Self {
                kind,
                has_feature: true,
            },
            None => Self {
                kind: name,
                has_feature: false,
            },
        }
    }
}

/// Splits a sandbox name into its driver kind and whether a feature suffix
/// was present.
#[must_use]
pub fn driver_name(name: &str) -> (&str, bool) {
    let parsed = DriverName::parse(name);
    (parsed.kind, parsed.has_feature)
}

/// Plain docker engine worker, no feature variant.
pub fn is_moby_worker<S: Sandbox + ?Sized>(sb: &S) -> bool {
    let (kind, has_feature) = driver_name(sb.name());
    kind == DRIVER_DOCKER && !has_feature
}

pub fn is_docker_worker<S: Sandbox + ?Sized>(sb: &S) -> bool {
    driver_name(sb.name()).0 == DRIVER_DOCKER
}

pub fn is_docker_container_worker<S: Sandbox + ?Sized>(sb: &S) -> bool {
    driver_name(sb.name()).0 == DRIVER_DOCKER_CONTAINER
}
