// ==========================================
// 科研成果评估系统 - 领域类型定义
// ==========================================
// 职责: 封闭枚举 + 字符串编解码（落库统一使用大写字符串）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// PublicationKind - 成果类型
// ==========================================
// ARTICLE: 连续出版物（期刊论文等）
// BOOK: 图书类（专著、章节；章节通过 parent_id 指向所属图书）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublicationKind {
    Article,
    Book,
}

impl PublicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationKind::Article => "ARTICLE",
            PublicationKind::Book => "BOOK",
        }
    }

    /// 是否计入专著子额度
    pub fn is_monograph_kind(&self) -> bool {
        matches!(self, PublicationKind::Book)
    }
}

impl fmt::Display for PublicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PublicationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARTICLE" => Ok(PublicationKind::Article),
            "BOOK" => Ok(PublicationKind::Book),
            other => Err(format!("未知成果类型: {}", other)),
        }
    }
}

// ==========================================
// ResponsibilityRole - 责任方式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponsibilityRole {
    Author,
    Editor,
}

impl ResponsibilityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsibilityRole::Author => "AUTHOR",
            ResponsibilityRole::Editor => "EDITOR",
        }
    }
}

impl fmt::Display for ResponsibilityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResponsibilityRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AUTHOR" => Ok(ResponsibilityRole::Author),
            "EDITOR" => Ok(ResponsibilityRole::Editor),
            other => Err(format!("未知责任方式: {}", other)),
        }
    }
}

// ==========================================
// AuthorKind - 人员类别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorKind {
    ResearchOnly,
    ResearchAndTeaching,
    DoctoralStudent,
    Other,
}

impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorKind::ResearchOnly => "RESEARCH_ONLY",
            AuthorKind::ResearchAndTeaching => "RESEARCH_AND_TEACHING",
            AuthorKind::DoctoralStudent => "DOCTORAL_STUDENT",
            AuthorKind::Other => "OTHER",
        }
    }

    /// 是否计入 N（博士生与其他人员不计入）
    pub fn counts_toward_n(&self) -> bool {
        matches!(
            self,
            AuthorKind::ResearchOnly | AuthorKind::ResearchAndTeaching
        )
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RESEARCH_ONLY" => Ok(AuthorKind::ResearchOnly),
            "RESEARCH_AND_TEACHING" => Ok(AuthorKind::ResearchAndTeaching),
            "DOCTORAL_STUDENT" => Ok(AuthorKind::DoctoralStudent),
            "OTHER" => Ok(AuthorKind::Other),
            other => Err(format!("未知人员类别: {}", other)),
        }
    }
}

// ==========================================
// Tier - 分值档位
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    // 顺序即高低：Low < Mid < Top
    Low,
    Mid,
    Top,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Top => "TOP",
            Tier::Mid => "MID",
            Tier::Low => "LOW",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TOP" => Ok(Tier::Top),
            "MID" => Ok(Tier::Mid),
            "LOW" => Ok(Tier::Low),
            other => Err(format!("未知档位: {}", other)),
        }
    }
}

// ==========================================
// Era - 评分规则时期
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    /// 改革前（A 表）
    A,
    /// 改革后（B 表）
    B,
}

impl Era {
    pub fn as_str(&self) -> &'static str {
        match self {
            Era::A => "A",
            Era::B => "B",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// CountMode - 合作者计数口径
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// 作者与编者合并计数
    All,
    AuthorsOnly,
    EditorsOnly,
}

impl CountMode {
    pub fn includes(&self, role: ResponsibilityRole) -> bool {
        match self {
            CountMode::All => true,
            CountMode::AuthorsOnly => role == ResponsibilityRole::Author,
            CountMode::EditorsOnly => role == ResponsibilityRole::Editor,
        }
    }
}

impl FromStr for CountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(CountMode::All),
            "authors_only" | "authors" => Ok(CountMode::AuthorsOnly),
            "editors_only" | "editors" => Ok(CountMode::EditorsOnly),
            other => Err(format!("未知计数口径: {}", other)),
        }
    }
}

// ==========================================
// RunStatus - 选优运行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("未知运行状态: {}", other)),
        }
    }
}

// ==========================================
// ConvergenceState - 收敛循环状态机
// ==========================================
// INITIAL → SOLVING → EVALUATING → {ACCEPTED, REJECTED} → (SOLVING | TERMINAL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConvergenceState {
    Initial,
    Solving,
    Evaluating,
    Accepted,
    Rejected,
    Terminal,
}

impl ConvergenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceState::Initial => "INITIAL",
            ConvergenceState::Solving => "SOLVING",
            ConvergenceState::Evaluating => "EVALUATING",
            ConvergenceState::Accepted => "ACCEPTED",
            ConvergenceState::Rejected => "REJECTED",
            ConvergenceState::Terminal => "TERMINAL",
        }
    }

    /// 合法状态转换
    pub fn can_transition_to(&self, next: ConvergenceState) -> bool {
        use ConvergenceState::*;
        matches!(
            (self, next),
            (Initial, Solving)
                | (Initial, Terminal)
                | (Solving, Evaluating)
                | (Evaluating, Accepted)
                | (Evaluating, Rejected)
                | (Accepted, Solving)
                | (Accepted, Terminal)
                | (Rejected, Terminal)
        )
    }
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// PinAction - 绑定变更动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PinAction {
    /// 收敛循环解除绑定
    Detach,
    /// 拒绝后回滚恢复
    Restore,
    /// 管理命令批量重置
    Reset,
}

impl PinAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinAction::Detach => "DETACH",
            PinAction::Restore => "RESTORE",
            PinAction::Reset => "RESET",
        }
    }
}

impl FromStr for PinAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DETACH" => Ok(PinAction::Detach),
            "RESTORE" => Ok(PinAction::Restore),
            "RESET" => Ok(PinAction::Reset),
            other => Err(format!("未知绑定动作: {}", other)),
        }
    }
}
