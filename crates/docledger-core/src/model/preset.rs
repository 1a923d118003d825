use crate::{
    dispatch::Alias,
    model::{FieldKind, FieldModel, IndexModel, RecordModel, SumInvariant, WriteMode},
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Preset
///
/// Built-in record shapes with their legacy operation names.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Student,
    Marble,
    AuditInfo,
}

impl Preset {
    pub const ALL: [Self; 3] = [Self::Student, Self::Marble, Self::AuditInfo];

    #[must_use]
    pub fn model(self) -> RecordModel {
        match self {
            Self::Student => student(),
            Self::Marble => marble(),
            Self::AuditInfo => audit_info(),
        }
    }

    /// Legacy operation names mapped onto canonical operations.
    #[must_use]
    pub fn legacy_aliases(self) -> Vec<(&'static str, Alias)> {
        let shared = [
            ("getMarblesByRange", Alias::op("range-query")),
            ("queryMarbles", Alias::op("predicate-query")),
        ];

        let own = match self {
            Self::Student => vec![
                ("initStudent", Alias::op("create")),
                ("readStudent", Alias::op("read")),
                ("updateStudent", Alias::op("update")),
                ("getHistoryForStudent", Alias::op("history")),
            ],
            Self::Marble => vec![
                ("initMarble", Alias::op("create")),
                ("readMarble", Alias::op("read")),
                ("getHistoryForMarble", Alias::op("history")),
                ("queryMarblesByOwner", Alias::bound("query-by-field", &["owner"])),
                (
                    "transferMarblesBasedOnColor",
                    Alias::bound("update-by-index", &["owner"]),
                ),
            ],
            Self::AuditInfo => vec![
                ("initInfo", Alias::op("create")),
                ("readInfo", Alias::op("read")),
                ("updateInfo", Alias::op("update")),
                ("getHistoryForInfo", Alias::op("history")),
            ],
        };

        own.into_iter().chain(shared).collect()
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Student => "student",
            Self::Marble => "marble",
            Self::AuditInfo => "audit_info",
        };
        write!(f, "{label}")
    }
}

fn student() -> RecordModel {
    let text = |name: &str| FieldModel::new(name, FieldKind::Text);
    let float = |name: &str| FieldModel::new(name, FieldKind::Float);

    // Create accepts any scores; only update re-checks the total.
    let total = SumInvariant::new(
        "collegeEntranceExaminationScore",
        &["chinese", "maths", "english", "comprehensiveTest"],
    )
    .enforced_on(&[WriteMode::Update]);

    RecordModel::new(
        "student",
        "studentCode",
        vec![
            text("studentCode"),
            text("gender"),
            text("censusRegister"),
            text("seniorHighSchool"),
            FieldModel::new("schoolCode", FieldKind::Int),
            float("collegeEntranceExaminationScore"),
            float("chinese"),
            float("maths"),
            float("english"),
            float("comprehensiveTest"),
        ],
    )
    .with_invariant(total)
}

fn marble() -> RecordModel {
    RecordModel::new(
        "marble",
        "name",
        vec![
            FieldModel::new("name", FieldKind::Text),
            FieldModel::new("color", FieldKind::Text),
            FieldModel::new("size", FieldKind::Int),
            FieldModel::new("owner", FieldKind::Text),
        ],
    )
    .with_index(IndexModel::new("color~name", &["color"]))
}

// Audit working-paper checklist; field names are the stored JSON names.
const AUDIT_FIELDS: [&str; 13] = [
    "被审计单位",
    "索引号",
    "项目",
    "财务报表截止日/期间",
    "编制",
    "编制日期",
    "复核",
    "复核日期",
    "是否执行业务承接或保持的相关程序",
    "是否签订审计业务约定书",
    "审计计划是否经适当人员批准",
    "所有重要实物资产是否均已实施监盘",
    "是否完成审计总结",
];

fn audit_info() -> RecordModel {
    RecordModel::new(
        "Info",
        AUDIT_FIELDS[0],
        AUDIT_FIELDS
            .iter()
            .map(|name| FieldModel::new(*name, FieldKind::Text))
            .collect(),
    )
}
