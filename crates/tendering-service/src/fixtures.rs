use std::fs;
use std::path::Path;
use tendering_core::DirectoryFixture;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load directory rows (organizations, employees, responsibility links)
/// from a JSON file. The marketplace reads these relationships but never
/// writes them, so deployments without an external directory seed one
/// here.
pub fn load(path: impl AsRef<Path>) -> Result<DirectoryFixture, FixtureError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_a_minimal_fixture_file() {
        let org = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let body = serde_json::json!({
            "organizations": [{"id": org, "name": "Roads Inc"}],
            "employees": [{"id": employee, "username": "alice"}],
            "responsibles": [{"organizationId": org, "employeeId": employee}],
        });

        let dir = std::env::temp_dir().join(format!("tendering-fixture-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("directory.json");
        std::fs::write(&path, body.to_string()).unwrap();

        let fixture = load(&path).unwrap();
        assert_eq!(fixture.organizations.len(), 1);
        assert_eq!(fixture.employees[0].username, "alice");
        assert_eq!(fixture.responsibles[0].organization_id, org);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("no-such-{}.json", Uuid::new_v4()));
        assert!(matches!(load(path), Err(FixtureError::Io(_))));
    }
}
