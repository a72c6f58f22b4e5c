use serde::{Deserialize, Serialize};

use crate::model::db::region::{Department, Municipality};

/// One department of the region catalog with its municipalities, as written
/// under `regions` in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentSeed {
    pub code: u32,
    pub name: String,
    #[serde(default)]
    pub municipalities: Vec<MunicipalitySeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalitySeed {
    pub code: u32,
    pub name: String,
}

impl DepartmentSeed {
    /// Split into storable documents.
    pub fn into_documents(self) -> (Department, Vec<Municipality>) {
        let municipalities = self
            .municipalities
            .into_iter()
            .map(|municipality| Municipality {
                code: municipality.code,
                department: self.code,
                name: municipality.name,
            })
            .collect();
        let department = Department {
            code: self.code,
            name: self.name,
        };
        (department, municipalities)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDescription {
    pub code: u32,
    pub name: String,
}

impl From<Department> for DepartmentDescription {
    fn from(department: Department) -> Self {
        Self {
            code: department.code,
            name: department.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityDescription {
    pub code: u32,
    pub department: u32,
    pub name: String,
}

impl From<Municipality> for MunicipalityDescription {
    fn from(municipality: Municipality) -> Self {
        Self {
            code: municipality.code,
            department: municipality.department,
            name: municipality.name,
        }
    }
}
