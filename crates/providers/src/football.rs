//! Competition standings (football-data.org v4).
//!
//! Widget parameters:
//! - `competition` (required) -- competition code or id, e.g. `FL1`.
//!
//! Besides the widget fetch, [`FootballAdapter`] serves two read-through
//! lookups used to fill the widget settings form: the competition list and
//! a single team.

use std::time::Duration;

use async_trait::async_trait;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::NormalizedValue;
use doshboard_core::widget::{WidgetConfig, WidgetType};
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::config::ProviderEndpoint;
use crate::http::{build_client, get_json, required};

/// Standings table type holding the overall ranking.
const TOTAL_TABLE: &str = "TOTAL";

#[derive(Debug, Deserialize)]
struct StandingsResponse {
    competition: Competition,
    #[serde(default)]
    standings: Vec<Standing>,
}

#[derive(Debug, Deserialize)]
struct Competition {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Standing {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    position: u32,
    team: Team,
    played_games: u32,
    points: i32,
    goal_difference: i32,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: i64,
    name: String,
    #[serde(default)]
    crest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompetitionsResponse {
    #[serde(default)]
    competitions: Vec<CompetitionEntry>,
}

#[derive(Debug, Deserialize)]
struct CompetitionEntry {
    id: i64,
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    emblem: Option<String>,
    #[serde(default)]
    area: Option<Area>,
}

#[derive(Debug, Deserialize)]
struct Area {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamResponse {
    id: i64,
    name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    tla: Option<String>,
    #[serde(default)]
    crest: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    founded: Option<i32>,
    #[serde(default)]
    running_competitions: Vec<RunningCompetition>,
}

#[derive(Debug, Deserialize)]
struct RunningCompetition {
    name: String,
    #[serde(default)]
    code: Option<String>,
}

/// One entry of [`FootballAdapter::competitions`].
#[derive(Debug, Serialize)]
struct CompetitionLine {
    id: i64,
    code: Option<String>,
    name: String,
    area: Option<String>,
    emblem: Option<String>,
}

/// One team line of the normalized value.
#[derive(Debug, Serialize)]
struct TeamLine {
    position: u32,
    team_id: i64,
    name: String,
    crest: Option<String>,
    played: u32,
    points: i32,
    goal_difference: i32,
}

pub struct FootballAdapter {
    client: reqwest::Client,
    endpoint: ProviderEndpoint,
}

impl FootballAdapter {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            client: build_client(endpoint.timeout),
            endpoint,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/v4/{path}", self.endpoint.base_url))
            .header("X-Auth-Token", &self.endpoint.api_key)
    }

    /// Competitions available under the configured API plan.
    pub async fn competitions(&self) -> Result<NormalizedValue, FetchError> {
        let response: CompetitionsResponse = get_json(self.get("competitions")).await?;

        let competitions: Vec<CompetitionLine> = response
            .competitions
            .into_iter()
            .map(|c| CompetitionLine {
                id: c.id,
                code: c.code,
                name: c.name,
                area: c.area.map(|a| a.name),
                emblem: c.emblem,
            })
            .collect();

        Ok(serde_json::json!({ "competitions": competitions }))
    }

    /// Details of one team. An unknown id is reported by the provider as
    /// 404, which surfaces as [`FetchError::InvalidConfig`].
    pub async fn team(&self, team_id: i64) -> Result<NormalizedValue, FetchError> {
        let team: TeamResponse = get_json(self.get(&format!("teams/{team_id}"))).await?;

        let competitions: Vec<serde_json::Value> = team
            .running_competitions
            .into_iter()
            .map(|c| serde_json::json!({ "code": c.code, "name": c.name }))
            .collect();

        Ok(serde_json::json!({
            "team_id": team.id,
            "name": team.name,
            "short_name": team.short_name,
            "tla": team.tla,
            "crest": team.crest,
            "venue": team.venue,
            "founded": team.founded,
            "competitions": competitions,
        }))
    }
}

#[async_trait]
impl ProviderAdapter for FootballAdapter {
    fn widget_type(&self) -> WidgetType {
        WidgetType::Football
    }

    fn timeout(&self) -> Duration {
        self.endpoint.timeout
    }

    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
        let competition = required(config, "competition")?;

        let response: StandingsResponse =
            get_json(self.get(&format!("competitions/{competition}/standings"))).await?;

        let table = response
            .standings
            .into_iter()
            .find(|s| s.kind == TOTAL_TABLE)
            .map(|s| s.table)
            .unwrap_or_default();

        let teams: Vec<TeamLine> = table
            .into_iter()
            .map(|row| TeamLine {
                position: row.position,
                team_id: row.team.id,
                name: row.team.name,
                crest: row.team.crest,
                played: row.played_games,
                points: row.points,
                goal_difference: row.goal_difference,
            })
            .collect();

        Ok(serde_json::json!({
            "competition": response.competition.name,
            "teams": teams,
        }))
    }
}
