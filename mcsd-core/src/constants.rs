//! Fixed identifier-naming-system URIs (§6).
//!
//! Implementations must compare against these exactly; they are not
//! configurable because they are defined by the Dutch mCSD profile, not by
//! any single deployment.

/// Naming system for the Dutch national unique-registration identifier
/// (URA) carried as a FHIR `Organization.identifier.system`.
pub const URA_NAMING_SYSTEM: &str = "http://fhir.nl/fhir/NamingSystem/ura";

/// Coding system for the payload-type code that marks an `Endpoint` as an
/// mCSD directory endpoint (as opposed to an ordinary clinical endpoint).
pub const MCSD_PAYLOAD_TYPE_SYSTEM: &str =
    "http://santeonnl.github.io/shared-components/CodeSystem/mcsd-payload-type";

/// Code, within [`MCSD_PAYLOAD_TYPE_SYSTEM`], identifying an Endpoint as an
/// mCSD directory endpoint.
pub const MCSD_DIRECTORY_PAYLOAD_CODE: &str = "mcsd-directory";

/// Default resource-type whitelist for discovered provider directories
/// (§6, `DirectoryResourceTypes`).
pub const DEFAULT_DIRECTORY_RESOURCE_TYPES: &[&str] = &[
    "Organization",
    "Endpoint",
    "Location",
    "HealthcareService",
    "PractitionerRole",
    "Practitioner",
];

/// Root (administration) directories always pull only these two types (§3).
pub const ROOT_RESOURCE_TYPES: &[&str] = &["Organization", "Endpoint"];

/// Maximum `partOf` chain depth walked before giving up (§4.E, §4.F).
pub const MAX_PARTOF_DEPTH: usize = 10;

/// Safety limit on total entries returned by a paginated search (§4.A).
pub const MAX_SEARCH_ENTRIES: usize = 1000;

/// Fixed page size requested via `_count` on every search (§4.A).
pub const SEARCH_PAGE_SIZE: usize = 100;
