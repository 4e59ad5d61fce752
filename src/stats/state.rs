//! Live game state: players, teams, the current round and recent history
//!
//! `GameState` has no interior locking. The server wraps it in a lock and
//! only the stats listener's worker ever takes the write side.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use super::arena::{NodeId, NodeKind};
use super::counters::StatOp;
use super::mode::{rules_for, GameMode, ModeRules};
use super::player::Player;
use super::round::{MapInfo, PlayerSnapshot, Round, RoundSnapshot, TeamSnapshot};
use super::team::{Team, TeamColor};
use crate::error::{Result, StackError};

/// Opponent key for deaths nobody caused
pub const ENVIRONMENT: &str = "environment";

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub create_unseen_players: bool,
    pub remembered_rounds: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            create_unseen_players: true,
            remembered_rounds: 5,
        }
    }
}

pub struct GameState {
    rules: Box<dyn ModeRules>,
    settings: GameSettings,
    round: Round,
    players: BTreeMap<String, Player>,
    disconnected: BTreeMap<String, Player>,
    teams: BTreeMap<TeamColor, Team>,
    /// flag color -> carrier name
    carriers: BTreeMap<TeamColor, String>,
    remembered: VecDeque<RoundSnapshot>,
}

/// Release whatever flag `player` carries, keeping the carrier index in step.
fn release_flag(carriers: &mut BTreeMap<TeamColor, String>, player: &mut Player) -> Option<TeamColor> {
    let color = player.carrying.take()?;
    if carriers.get(&color) == Some(&player.name) {
        carriers.remove(&color);
    }
    Some(color)
}

impl GameState {
    pub fn new(mode: GameMode, settings: GameSettings, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            rules: rules_for(mode),
            settings,
            round: Round::new(None, now),
            players: BTreeMap::new(),
            disconnected: BTreeMap::new(),
            teams: BTreeMap::new(),
            carriers: BTreeMap::new(),
            remembered: VecDeque::new(),
        };
        if let Some(teams) = state.rules.as_teams() {
            for &color in teams.team_colors() {
                let node = state
                    .round
                    .arena
                    .insert(NodeKind::Team(color), Some(state.round.root));
                state.teams.insert(color, Team::new(color, node));
            }
        }
        state
    }

    pub fn mode(&self) -> GameMode {
        self.rules.mode()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn parent_for(&self, team: Option<TeamColor>) -> NodeId {
        team.and_then(|color| self.teams.get(&color))
            .map(|t| t.node)
            .unwrap_or(self.round.root)
    }

    fn spawn_player(&mut self, name: &str, now: DateTime<Utc>) -> Player {
        let node = self
            .round
            .arena
            .insert(NodeKind::Player(name.to_string()), Some(self.round.root));
        Player::new(name, node, now)
    }

    /// Make sure `name` is a connected player, creating it on first sighting
    /// when the settings allow.
    fn ensure_player(&mut self, name: &str, now: DateTime<Utc>) -> Result<()> {
        if self.players.contains_key(name) {
            return Ok(());
        }
        if !self.settings.create_unseen_players {
            return Err(StackError::PlayerNotFound(name.to_string()));
        }
        debug!("Creating player {} on first sighting", name);
        let player = self.revive_or_spawn(name, now);
        self.players.insert(name.to_string(), player);
        Ok(())
    }

    /// A fresh instance of `name`: the disconnected record detached from its
    /// old team, or a new player under the round.
    fn revive_or_spawn(&mut self, name: &str, now: DateTime<Utc>) -> Player {
        match self.disconnected.remove(name) {
            Some(mut player) => {
                player.instances += 1;
                player.team = None;
                player.playing = false;
                player.connected_at = now;
                self.round
                    .arena
                    .set_parent(player.node, Some(self.round.root));
                info!("Player {} reconnected (instance {})", name, player.instances);
                player
            }
            None => {
                info!("Player {} connected", name);
                self.spawn_player(name, now)
            }
        }
    }

    fn player_mut(&mut self, name: &str) -> Result<&mut Player> {
        self.players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))
    }

    fn node_of(&self, name: &str) -> Result<NodeId> {
        self.players
            .get(name)
            .map(|p| p.node)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))
    }

    fn apply(&mut self, name: &str, op: StatOp) -> Result<()> {
        let node = self.node_of(name)?;
        self.round.arena.apply(node, op);
        Ok(())
    }

    fn check_flag_color(&self, color: TeamColor) -> Result<()> {
        match self.rules.as_flags() {
            Some(flags) if flags.flag_colors().contains(&color) => Ok(()),
            Some(_) => Err(StackError::TeamNotFound(color.to_string())),
            None => Err(StackError::TeamNotFound(format!(
                "{color} (no flags in {} mode)",
                self.rules.mode()
            ))),
        }
    }

    pub fn connect(&mut self, name: &str, ip: Option<String>, port: Option<u16>, now: DateTime<Utc>) {
        if let Some(player) = self.players.get_mut(name) {
            debug!("Player {} connected again without disconnecting", name);
            player.ip = ip;
            player.port = port;
            return;
        }

        let mut player = self.revive_or_spawn(name, now);
        player.ip = ip;
        player.port = port;
        player.connected_at = now;
        self.players.insert(name.to_string(), player);
    }

    pub fn disconnect(&mut self, name: &str) -> Result<()> {
        let mut player = self
            .players
            .remove(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        release_flag(&mut self.carriers, &mut player);
        player.playing = false;
        info!("Player {} disconnected", name);
        self.disconnected.insert(name.to_string(), player);
        Ok(())
    }

    pub fn join_game(&mut self, name: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_player(name, now)?;
        self.player_mut(name)?.playing = true;
        self.round.should_remember = true;
        Ok(())
    }

    pub fn join_team(&mut self, name: &str, color: TeamColor, now: DateTime<Utc>) -> Result<()> {
        let known = self
            .rules
            .as_teams()
            .is_some_and(|teams| teams.has_team(color));
        let team_node = match self.teams.get(&color) {
            Some(team) if known => team.node,
            _ => return Err(StackError::TeamNotFound(color.to_string())),
        };
        self.ensure_player(name, now)?;

        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        if player.team != Some(color) {
            release_flag(&mut self.carriers, player);
        }
        player.team = Some(color);
        player.playing = true;
        let node = player.node;
        self.round.arena.set_parent(node, Some(team_node));
        self.round.should_remember = true;
        debug!("Player {} joined team {}", name, color);
        Ok(())
    }

    pub fn leave_game(&mut self, name: &str) -> Result<()> {
        let root = self.round.root;
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        release_flag(&mut self.carriers, player);
        player.playing = false;
        player.team = None;
        let node = player.node;
        self.round.arena.set_parent(node, Some(root));
        Ok(())
    }

    /// `fragger` killed `fragged` with `weapon`. Killing a flag carrier
    /// releases the flag and credits one runner frag in the same update.
    pub fn frag(&mut self, fragger: &str, fragged: &str, weapon: &str, now: DateTime<Utc>) -> Result<()> {
        if fragger == fragged {
            return self.death(fragged, weapon, true, now);
        }
        self.ensure_player(fragger, now)?;
        self.ensure_player(fragged, now)?;

        let victim = self
            .players
            .get_mut(fragged)
            .ok_or_else(|| StackError::PlayerNotFound(fragged.to_string()))?;
        victim.weapons.record_death(weapon);
        victim.opponents.record_death(fragger);
        let runner = release_flag(&mut self.carriers, victim);

        let killer = self.player_mut(fragger)?;
        killer.weapons.record_frag(weapon);
        killer.opponents.record_frag(fragged);

        self.apply(fragger, StatOp::Frag)?;
        self.apply(fragged, StatOp::Death)?;
        if let Some(color) = runner {
            debug!("{} fragged {} carrying the {} flag", fragger, fragged, color);
            self.apply(fragger, StatOp::RunnerFragged)?;
        }
        self.round.should_remember = true;
        Ok(())
    }

    /// A death with no other player involved.
    pub fn death(&mut self, name: &str, weapon: &str, suicide: bool, now: DateTime<Utc>) -> Result<()> {
        self.ensure_player(name, now)?;
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        release_flag(&mut self.carriers, player);
        player.weapons.record_death(weapon);
        let opponent = if suicide { name } else { ENVIRONMENT };
        player.opponents.record_death(opponent);

        self.apply(name, StatOp::Death)?;
        if suicide {
            self.apply(name, StatOp::Suicide)?;
        }
        self.round.should_remember = true;
        Ok(())
    }

    fn take_flag(&mut self, name: &str, color: TeamColor, op: StatOp, now: DateTime<Utc>) -> Result<()> {
        self.check_flag_color(color)?;
        self.ensure_player(name, now)?;

        if let Some(previous) = self.carriers.get(&color).cloned() {
            if previous != name {
                debug!("{} flag moved from {} to {}", color, previous, name);
                if let Some(holder) = self.players.get_mut(&previous) {
                    holder.carrying = None;
                }
                self.carriers.remove(&color);
            }
        }

        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        if player.carrying != Some(color) {
            release_flag(&mut self.carriers, player);
        }
        player.carrying = Some(color);
        self.carriers.insert(color, name.to_string());
        self.apply(name, op)
    }

    pub fn flag_touch(&mut self, name: &str, color: TeamColor, now: DateTime<Utc>) -> Result<()> {
        self.take_flag(name, color, StatOp::FlagTouch, now)
    }

    pub fn flag_pick(&mut self, name: &str, color: TeamColor, now: DateTime<Utc>) -> Result<()> {
        self.take_flag(name, color, StatOp::FlagPick, now)
    }

    pub fn flag_loss(&mut self, name: &str, color: TeamColor, now: DateTime<Utc>) -> Result<()> {
        self.check_flag_color(color)?;
        self.ensure_player(name, now)?;
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        release_flag(&mut self.carriers, player);
        self.apply(name, StatOp::FlagDrop)
    }

    pub fn flag_return(&mut self, name: &str, color: TeamColor, now: DateTime<Utc>) -> Result<()> {
        self.check_flag_color(color)?;
        self.ensure_player(name, now)?;
        if let Some(holder) = self.carriers.remove(&color) {
            if let Some(player) = self.players.get_mut(&holder) {
                player.carrying = None;
            }
        }
        self.apply(name, StatOp::FlagReturn)
    }

    /// `name` scored for `team`; whatever flag they carried goes home.
    pub fn flag_cap(&mut self, name: &str, team: TeamColor, now: DateTime<Utc>) -> Result<()> {
        if self.rules.as_flags().is_none() {
            return self.check_flag_color(team);
        }
        self.ensure_player(name, now)?;
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))?;
        release_flag(&mut self.carriers, player);
        self.apply(name, StatOp::FlagCap)
    }

    pub fn rcon(&mut self, name: &str, op: StatOp, now: DateTime<Utc>) -> Result<()> {
        self.ensure_player(name, now)?;
        self.apply(name, op)
    }

    /// Count a chat line for an already resolved speaker.
    pub fn message(&mut self, name: &str) -> Result<()> {
        self.apply(name, StatOp::Message)
    }

    /// Close the current round and start a new one.
    ///
    /// Returns the finished round when it was played, after adding it to
    /// the in-memory history. Disconnected players are purged; connected
    /// players and teams get fresh nodes in the new round.
    pub fn map_change(&mut self, number: u32, name: &str, now: DateTime<Utc>) -> Option<RoundSnapshot> {
        let finished = self.round.should_remember.then(|| self.round_snapshot(now));
        if let Some(snapshot) = &finished {
            self.remembered.push_front(snapshot.clone());
            self.remembered.truncate(self.settings.remembered_rounds.max(1));
        }

        self.disconnected.clear();
        self.carriers.clear();
        self.round = Round::new(
            Some(MapInfo {
                number,
                name: name.to_string(),
            }),
            now,
        );

        let root = self.round.root;
        for team in self.teams.values_mut() {
            team.node = self.round.arena.insert(NodeKind::Team(team.color), Some(root));
        }
        let team_nodes: BTreeMap<TeamColor, NodeId> =
            self.teams.iter().map(|(color, team)| (*color, team.node)).collect();
        for player in self.players.values_mut() {
            let parent = player
                .team
                .and_then(|color| team_nodes.get(&color).copied())
                .unwrap_or(root);
            player.node = self
                .round
                .arena
                .insert(NodeKind::Player(player.name.clone()), Some(parent));
            player.carrying = None;
            player.weapons.clear();
            player.opponents.clear();
        }

        info!("Map changed to map{:02}: {}", number, name);
        finished
    }

    /// The process died: everyone is gone. Returns how many players were
    /// disconnected.
    pub fn process_exit(&mut self) -> usize {
        let names: Vec<String> = self.players.keys().cloned().collect();
        for name in &names {
            if let Some(mut player) = self.players.remove(name) {
                release_flag(&mut self.carriers, &mut player);
                player.playing = false;
                self.disconnected.insert(name.clone(), player);
            }
        }
        self.carriers.clear();
        names.len()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_map(&self) -> Option<&MapInfo> {
        self.round.map.as_ref()
    }

    pub fn current_round(&self) -> &Round {
        &self.round
    }

    pub fn flag_carrier(&self, color: TeamColor) -> Option<&str> {
        self.carriers.get(&color).map(String::as_str)
    }

    fn snapshot_player(&self, player: &Player, connected: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            name: player.name.clone(),
            ip: player.ip.clone(),
            instances: player.instances,
            team: player.team,
            playing: player.playing,
            has_flag: player.has_flag(),
            connected,
            counters: self.round.arena.counters(player.node),
            frags_by_weapon: player.weapons.frags.clone(),
            deaths_by_weapon: player.weapons.deaths.clone(),
            frags_by_opponent: player.opponents.frags.clone(),
            deaths_by_opponent: player.opponents.deaths.clone(),
        }
    }

    /// A connected player, or one that left during this round.
    pub fn player(&self, name: &str) -> Result<PlayerSnapshot> {
        if let Some(player) = self.players.get(name) {
            return Ok(self.snapshot_player(player, true));
        }
        self.disconnected
            .get(name)
            .map(|player| self.snapshot_player(player, false))
            .ok_or_else(|| StackError::PlayerNotFound(name.to_string()))
    }

    pub fn players(&self) -> Vec<PlayerSnapshot> {
        self.players
            .values()
            .map(|player| self.snapshot_player(player, true))
            .collect()
    }

    pub fn team(&self, color: TeamColor) -> Result<TeamSnapshot> {
        let team = self
            .teams
            .get(&color)
            .ok_or_else(|| StackError::TeamNotFound(color.to_string()))?;
        Ok(TeamSnapshot {
            color,
            counters: self.round.arena.counters(team.node),
            players: self
                .players
                .values()
                .filter(|p| p.team == Some(color))
                .map(|p| p.name.clone())
                .collect(),
        })
    }

    pub fn teams(&self) -> Vec<TeamSnapshot> {
        self.teams
            .keys()
            .filter_map(|color| self.team(*color).ok())
            .collect()
    }

    pub fn round_snapshot(&self, now: DateTime<Utc>) -> RoundSnapshot {
        RoundSnapshot {
            map: self.round.map.clone(),
            started_at: self.round.started_at,
            ended_at: now,
            totals: self.round.totals(),
            teams: self.teams(),
            players: self
                .players
                .values()
                .map(|p| self.snapshot_player(p, true))
                .chain(self.disconnected.values().map(|p| self.snapshot_player(p, false)))
                .collect(),
        }
    }

    /// Up to `count` finished rounds, most recent first.
    pub fn remembered(&self, count: usize) -> Vec<RoundSnapshot> {
        self.remembered.iter().take(count).cloned().collect()
    }
}
