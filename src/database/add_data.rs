use log::info;

use super::{blob::encode_array, point_index, OpacityDb, Units};

use crate::{continuum::ContinuumRecord, errors::OpacityErr};

impl OpacityDb {
    /// Write the header row unless one is already there.
    ///
    /// Returns `true` if this call wrote it. The check and the insert share one immediate
    /// transaction, so two writers can't both insert.
    pub fn write_header(&self, units: &Units, wavenumber_grid: &[f64]) -> Result<bool, OpacityErr> {
        let tx = rusqlite::Transaction::new_unchecked(
            &self.db_conn,
            rusqlite::TransactionBehavior::Immediate,
        )?;

        let num_rows: i64 = tx.query_row("SELECT COUNT(*) FROM header", [], |row| row.get(0))?;
        if num_rows > 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO header
                (pressure_unit, temperature_unit, wavenumber_grid, continuum_unit, molecular_unit)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                units.pressure,
                units.temperature,
                encode_array(wavenumber_grid)?,
                units.continuum,
                units.molecular,
            ],
        )?;
        tx.commit()?;

        Ok(true)
    }

    /// Insert one row per temperature and pressure for `molecule`.
    ///
    /// `opacity_at(it, ip)` supplies the opacity on the header's wavenumber grid. Rows are
    /// committed together once every one of them has been built.
    pub fn insert_molecule<F>(
        &self,
        molecule: &str,
        temperatures: &[f64],
        pressures: &[f64],
        mut opacity_at: F,
    ) -> Result<usize, OpacityErr>
    where
        F: FnMut(usize, usize) -> Result<Vec<f64>, OpacityErr>,
    {
        let n_wno = self.header()?.wavenumber_grid.len();

        let tx = self.db_conn.unchecked_transaction()?;
        let mut num_rows = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO molecular (ptid, molecule, temperature, pressure, opacity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (it, &temperature) in temperatures.iter().enumerate() {
                info!("{}: temperature = {} K", molecule, temperature);

                for (ip, &pressure) in pressures.iter().enumerate() {
                    let opacity = opacity_at(it, ip)?;
                    if opacity.len() != n_wno {
                        return Err(OpacityErr::LengthMismatch {
                            expected: n_wno,
                            actual: opacity.len(),
                        });
                    }

                    stmt.execute(rusqlite::params![
                        point_index(it, ip, pressures.len()) as i64,
                        molecule,
                        temperature,
                        pressure,
                        encode_array(&opacity)?,
                    ])?;
                    num_rows += 1;
                }
            }
        }
        tx.commit()?;

        Ok(num_rows)
    }

    /// Insert continuum rows, each on the header's wavenumber grid.
    pub fn insert_continuum(&self, records: &[ContinuumRecord]) -> Result<usize, OpacityErr> {
        let n_wno = self.header()?.wavenumber_grid.len();

        let tx = self.db_conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO continuum (molecule, temperature, opacity) VALUES (?1, ?2, ?3)",
            )?;

            for record in records {
                if record.opacity.len() != n_wno {
                    return Err(OpacityErr::LengthMismatch {
                        expected: n_wno,
                        actual: record.opacity.len(),
                    });
                }

                stmt.execute(rusqlite::params![
                    record.pair,
                    record.temperature,
                    encode_array(&record.opacity)?,
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }
}
