use super::{blob::decode_array, HeaderRecord, OpacityDb, OpacityRecord, Units};

use crate::{continuum::ContinuumRecord, errors::OpacityErr};

impl OpacityDb {
    /// Check whether the header row has been written.
    pub fn has_header(&self) -> Result<bool, OpacityErr> {
        let num_rows: i64 =
            self.db_conn
                .query_row("SELECT COUNT(*) FROM header", [], |row| row.get(0))?;
        Ok(num_rows > 0)
    }

    /// Retrieve the header row.
    pub fn header(&self) -> Result<HeaderRecord, OpacityErr> {
        let res = self.db_conn.query_row(
            "
                SELECT pressure_unit, temperature_unit, wavenumber_grid, continuum_unit, molecular_unit
                FROM header
                ORDER BY id
                LIMIT 1
            ",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        let (pressure, temperature, grid, continuum, molecular) = match res {
            Ok(vals) => vals,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(OpacityErr::MissingHeader),
            Err(x) => return Err(OpacityErr::Database(x)),
        };

        Ok(HeaderRecord {
            units: Units {
                pressure,
                temperature,
                continuum,
                molecular,
            },
            wavenumber_grid: decode_array(&grid)?,
        })
    }

    /// Get the list of molecules with line opacities in the database.
    pub fn molecules(&self) -> Result<Vec<String>, OpacityErr> {
        let mut stmt = self
            .db_conn
            .prepare("SELECT DISTINCT molecule FROM molecular ORDER BY molecule")?;

        let vals: Result<Vec<String>, OpacityErr> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|res| res.map_err(OpacityErr::Database))
            .collect();

        vals
    }

    /// Get the list of molecule pairs with continuum opacities in the database.
    pub fn continuum_pairs(&self) -> Result<Vec<String>, OpacityErr> {
        let mut stmt = self
            .db_conn
            .prepare("SELECT DISTINCT molecule FROM continuum ORDER BY molecule")?;

        let vals: Result<Vec<String>, OpacityErr> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|res| res.map_err(OpacityErr::Database))
            .collect();

        vals
    }

    /// Retrieve the rows of `molecule` with `first_ptid <= ptid <= last_ptid`, ordered by ptid.
    pub fn molecular(
        &self,
        molecule: &str,
        first_ptid: i64,
        last_ptid: i64,
    ) -> Result<Vec<OpacityRecord>, OpacityErr> {
        let mut stmt = self.db_conn.prepare(
            "
                SELECT id, ptid, molecule, pressure, temperature, opacity
                FROM molecular
                WHERE molecule = ?1 AND ptid BETWEEN ?2 AND ?3
                ORDER BY ptid
            ",
        )?;

        let vals: Result<Vec<OpacityRecord>, OpacityErr> = stmt
            .query_and_then(
                rusqlite::params![molecule, first_ptid, last_ptid],
                Self::parse_row_to_opacity,
            )?
            .collect();

        vals
    }

    /// Retrieve a single row of `molecule`.
    pub fn opacity(&self, molecule: &str, ptid: i64) -> Result<OpacityRecord, OpacityErr> {
        self.molecular(molecule, ptid, ptid)?
            .into_iter()
            .next()
            .ok_or(OpacityErr::NotInIndex)
    }

    fn parse_row_to_opacity(row: &rusqlite::Row) -> Result<OpacityRecord, OpacityErr> {
        let blob: Vec<u8> = row.get(5)?;

        Ok(OpacityRecord {
            id: row.get(0)?,
            ptid: row.get(1)?,
            molecule: row.get(2)?,
            pressure: row.get(3)?,
            temperature: row.get(4)?,
            opacity: decode_array(&blob)?,
        })
    }

    /// Retrieve every continuum row for a molecule pair, ordered by temperature.
    pub fn continuum(&self, pair: &str) -> Result<Vec<ContinuumRecord>, OpacityErr> {
        let mut stmt = self.db_conn.prepare(
            "
                SELECT molecule, temperature, opacity
                FROM continuum
                WHERE molecule = ?1
                ORDER BY temperature
            ",
        )?;

        let vals: Result<Vec<ContinuumRecord>, OpacityErr> = stmt
            .query_and_then(rusqlite::params![pair], |row| -> Result<_, OpacityErr> {
                let blob: Vec<u8> = row.get(2)?;
                Ok(ContinuumRecord {
                    pair: row.get(0)?,
                    temperature: row.get(1)?,
                    opacity: decode_array(&blob)?,
                })
            })?
            .collect();

        vals
    }
}
